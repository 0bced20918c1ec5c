use castor3d_types::{ProgramStatus, ShaderType, VariableType};
use thiserror::Error;

use crate::util::typedefs::SsoString;

/// Reason why the engine failed to start or to find one of its parts.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No render system named {name:?} is registered (available: {available:?})")]
    UnknownRenderSystem { name: SsoString, available: Vec<SsoString> },
    #[error("No render system is registered")]
    NoRenderSystem,
    #[error("Render system {name:?} failed to initialise: {reason}")]
    RenderSystemInitialisation { name: SsoString, reason: String },
    #[error("No render technique named {name:?} is registered")]
    UnknownTechnique { name: SsoString },
    #[error("Render technique {name:?} failed to initialise")]
    TechniqueInitialisation {
        name: SsoString,
        #[source]
        source: ShaderError,
    },
    #[error("Render technique {name:?} can't run on render system {render_system:?}")]
    UnsupportedTechnique { name: SsoString, render_system: SsoString },
    #[error("No scene named {name:?}")]
    UnknownScene { name: SsoString },
    #[error("A frame listener named {name:?} already exists")]
    DuplicateListener { name: SsoString },
}

/// Failures of the shader program state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    #[error("Render system {backend:?} has no programmable pipeline")]
    ShadersUnsupported { backend: SsoString },
    #[error("Program {program:?} has no source for any stage")]
    NoSource { program: SsoString },
    #[error("Program {program:?} failed to compile its {} stage:\n{log}", .stage.name())]
    Compile {
        program: SsoString,
        stage: ShaderType,
        log: String,
    },
    #[error("Program {program:?} failed to link:\n{log}")]
    Link { program: SsoString, log: String },
    #[error("Program {program:?} is latched in {status:?}, initialise it again to retry")]
    Latched { program: SsoString, status: ProgramStatus },
    #[error("Program {program:?} can't {operation} while {status:?}")]
    InvalidState {
        program: SsoString,
        operation: &'static str,
        status: ProgramStatus,
    },
}

/// Failures of typed frame variable access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error("Variable {name:?} is a {expected} but was given a {actual}")]
    TypeMismatch {
        name: SsoString,
        expected: VariableType,
        actual: VariableType,
    },
    #[error("Variable {name:?} has {occurrences} occurrences, index {index} is out of range")]
    IndexOutOfRange {
        name: SsoString,
        index: usize,
        occurrences: usize,
    },
    #[error("A variable named {name:?} already exists")]
    DuplicateName { name: SsoString },
}

/// Failures of scene graph editing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Scene has no node {name}")]
    UnknownNode { name: SsoString },
    #[error("Scene already has a node named {name:?}")]
    DuplicateNode { name: SsoString },
    #[error("Attaching {child:?} to {parent:?} would make the graph cyclic")]
    Cycle { child: SsoString, parent: SsoString },
    #[error("The root node can't be removed or attached")]
    RootNode,
}

/// Failures reading a scene description file. Apart from [`ParseError::Io`]
/// these are collected as diagnostics rather than returned.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Couldn't read {path:?}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected end of file, {open} sections still open")]
    UnexpectedEof { open: usize },
    #[error("Unknown directive {directive:?}")]
    UnknownDirective { directive: SsoString },
    #[error("Directive {directive:?}: {message}")]
    InvalidParameters { directive: SsoString, message: String },
    #[error("Unbalanced closing brace")]
    UnbalancedBrace,
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error(transparent)]
    Mesh(#[from] castor3d_types::MeshValidationError),
}

/// Failures loading an engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read config file {path:?}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed config")]
    Toml(#[from] toml::de::Error),
}

/// Failures reading or writing a binary mesh file.
#[derive(Error, Debug)]
pub enum MeshFileError {
    #[error("Couldn't access mesh file {path:?}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Not a mesh file, magic is {found:?}")]
    BadMagic { found: [u8; 4] },
    #[error("Mesh file version {found} isn't supported, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("Mesh file ends in the middle of {what}")]
    Truncated { what: &'static str },
    #[error("Mesh name isn't valid UTF-8")]
    BadName,
    #[error(transparent)]
    Mesh(#[from] castor3d_types::MeshValidationError),
}
