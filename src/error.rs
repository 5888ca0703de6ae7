use core::fmt;
use std::io;

/// Error enum with all errors that can be returned by functions from this crate
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The disk image returned an error during an input/output operation.
    Io(io::Error),
    /// A read operation cannot be completed because the end of the image has been reached prematurely.
    UnexpectedEof,
    /// A parameter was incorrect.
    InvalidInput,
    /// File system internal structures are corrupted/invalid.
    CorruptedFileSystem,
    /// Memory for the allocation table could not be obtained.
    AllocationFailed,
    /// A cluster chain links back to a cluster it has already visited.
    CyclicClusterChain(u16),
    /// A cluster chain references a cluster that lies past the end of the allocation table.
    ClusterOutOfRange(u16),
}

impl Error {
    /// Returns `true` for errors that only end the current directory level or extraction.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEof | Error::CyclicClusterChain(_) | Error::ClusterOutOfRange(_)
        )
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
            _ => Error::Io(error),
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(io_error) => io_error,
            Error::UnexpectedEof => Self::new(io::ErrorKind::UnexpectedEof, error),
            Error::InvalidInput => Self::new(io::ErrorKind::InvalidInput, error),
            Error::AllocationFailed => Self::new(io::ErrorKind::OutOfMemory, error),
            Error::CorruptedFileSystem | Error::CyclicClusterChain(_) | Error::ClusterOutOfRange(_) => {
                Self::new(io::ErrorKind::InvalidData, error)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(io_error) => write!(f, "IO error: {}", io_error),
            Error::UnexpectedEof => write!(f, "Unexpected end of file"),
            Error::InvalidInput => write!(f, "Invalid input"),
            Error::CorruptedFileSystem => write!(f, "Corrupted file system"),
            Error::AllocationFailed => write!(f, "Memory allocation for FAT12 table failed"),
            Error::CyclicClusterChain(cluster) => write!(f, "Cluster chain loops back to cluster {}", cluster),
            Error::ClusterOutOfRange(cluster) => write!(f, "Cluster {} is outside of the allocation table", cluster),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(io_error) = self {
            Some(io_error)
        } else {
            None
        }
    }
}
