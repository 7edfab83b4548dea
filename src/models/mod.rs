pub mod frame;
pub mod grid;
pub mod record;
pub mod region;
pub mod variable;

pub use frame::{Frame, FrameSequence, SourceFrame};
pub use grid::GridSpec;
pub use record::{RecordTable, SeriesRecord};
pub use region::{Geometry, Region};
pub use variable::{BandRename, Reducer, VariableGroup};
