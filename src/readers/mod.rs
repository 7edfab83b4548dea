pub mod frame_source;
pub mod parquet_frames;
pub mod region_reader;

pub use frame_source::{FrameSource, InMemoryFrameSource};
pub use parquet_frames::{ParquetFrameReader, PixelObservation};
pub use region_reader::RegionReader;
