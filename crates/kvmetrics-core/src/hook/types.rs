//! Values flowing through dial, command and pipeline hooks

use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream to a server
pub trait AsyncConn: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncConn for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// An established connection as returned by a dial
pub type BoxedConn = Box<dyn AsyncConn>;

/// Where a dial connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    /// Network kind, e.g. "tcp" or "unix"
    pub network: String,
    /// Address within that network
    pub addr: String,
}

impl DialTarget {
    pub fn new(network: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            addr: addr.into(),
        }
    }

    /// A TCP target
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new("tcp", addr)
    }
}

/// A single command sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
}

impl Command {
    /// Create a command with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Builder method: append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// A server reply to a single command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Status(String),
    Int(i64),
    Bulk(Vec<u8>),
    Array(Vec<Reply>),
}
