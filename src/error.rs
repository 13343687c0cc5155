use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum XmitError {
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected end of input in the {stage} stage at offset {offset}")]
    #[diagnostic(help("the input file is incomplete; was the transfer cut short?"))]
    UnexpectedEof { stage: &'static str, offset: u64 },

    #[error("truncated record at offset {offset}: declared {declared} payload bytes, got {got}")]
    TruncatedRecord {
        offset: u64,
        declared: usize,
        got: usize,
    },

    #[error("truncated text unit 0x{id:04X}: declared value of {declared} bytes overruns the remaining {available}")]
    TruncatedAttribute {
        id: u16,
        declared: usize,
        available: usize,
    },

    #[error("control record at offset {offset} carries unrecognized identifier {id:?}")]
    InvalidControlRecord { offset: u64, id: String },

    #[error("segment reassembly error at offset {offset}: {detail}")]
    SegmentOrder { offset: u64, detail: &'static str },

    #[error("reassembled block of {len} bytes exceeds the 16-bit length field of the unload format")]
    OversizedBlock { len: usize },

    #[error("invalid {which} descriptor: {detail}")]
    InvalidDescriptor { which: &'static str, detail: String },

    #[error("unknown codepage {name:?}")]
    #[diagnostic(help("supported codepages are IBM-1047 and IBM-037"))]
    UnknownCodepage { name: String },

    #[error("variable-length record format {recfm:?} is not supported")]
    #[diagnostic(help("only fixed-length datasets (RECFM F, FB, FBA, ...) can be extracted"))]
    VariableLengthUnsupported { recfm: String },

    #[error("target directory does not exist: {path}")]
    #[diagnostic(help("create the directory first or pass a different --target"))]
    TargetMissing { path: String },
}

impl XmitError {
    /// Process exit code for a fatal error. A missing target directory is a
    /// usage problem (4); everything else is an I/O or parse failure (8).
    pub fn exit_code(&self) -> u8 {
        match self {
            XmitError::TargetMissing { .. } => 4,
            _ => 8,
        }
    }
}

/// Wrap an `io::Error` with a human-readable context line.
pub fn io_context(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> XmitError {
    let context = context.into();
    move |source| XmitError::Io { context, source }
}
