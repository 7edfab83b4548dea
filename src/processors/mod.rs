pub mod aggregator;
pub mod assembler;
pub mod derive;
pub mod join;
pub mod pipeline;
pub mod zonal;

pub use aggregator::{DailySeriesBuilder, TimeWindowAggregator};
pub use assembler::SeriesAssembler;
pub use derive::{relative_humidity, DerivedVariableComputer, MissingValueSubstitutor};
pub use join::InnerJoinEngine;
pub use pipeline::DailyPipeline;
pub use zonal::ZonalStatisticsExtractor;
