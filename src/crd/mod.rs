//! Custom Resource Definitions for the Jupyter operator

mod notebook;
mod types;

pub use notebook::{JupyterNotebook, JupyterNotebookSpec, JupyterNotebookStatus};
pub use types::{
    MaterialSpec, MemoryFigure, NotebookAccess, NotebookOptions, NotebookPhase, ProjectSpec,
    ProjectStatus, ResourceFigures, ResourcesSpec, ResourcesStatus, SecurityContextSpec,
    SessionStatus,
};
