//! stlview core library - STL mesh codec and the geometry around it
//!
//! Loading, saving and format detection for binary and ASCII STL files,
//! blocking or async with progress and cancellation, plus procedural test
//! meshes and the buffers and cameras a renderer derives from a mesh.
pub mod generate;
pub mod geometry;
pub mod stl;
pub mod view;

// Re-export commonly used types
pub use geometry::{Mesh, Triangle, DEFAULT_SOLID_NAME};
pub use stl::{
    load, load_async, save, save_async, CancelFlag, Progress, ProgressObserver, StlError,
    StlFormat, StlResult,
};
pub use view::{Bounds, Camera, RenderBuffers, Viewpoint};
