use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{RecordTable, Region};
use crate::processors::{
    DailySeriesBuilder, DerivedVariableComputer, InnerJoinEngine, MissingValueSubstitutor,
    SeriesAssembler, ZonalStatisticsExtractor,
};
use crate::readers::FrameSource;
use crate::utils::progress::ProgressReporter;

/// Orchestrates one pipeline run: per-group daily compositing, the chained
/// inner join, and zonal extraction into the flat output table.
pub struct DailyPipeline {
    max_workers: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl DailyPipeline {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            cancel: None,
        }
    }

    /// Install a flag that aborts in-flight aggregation when set
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn run(
        &self,
        config: &PipelineConfig,
        sources: &BTreeMap<String, Arc<dyn FrameSource>>,
        regions: Vec<Region>,
        progress: Option<&ProgressReporter>,
    ) -> Result<RecordTable> {
        // All configuration errors surface before any aggregation begins
        config.validate()?;
        let grid = self.resolve_grid(config, sources)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        pool.install(|| {
            let mut sequences = Vec::with_capacity(config.groups.len());
            for (i, group) in config.groups.iter().enumerate() {
                if let Some(p) = progress {
                    p.set_message(&format!(
                        "Aggregating group '{}' ({} over {} bands)...",
                        group.name,
                        group.reducer,
                        group.bands.len()
                    ));
                    p.update(i as u64);
                }
                let source = sources.get(&group.source).ok_or_else(|| {
                    PipelineError::Config(format!(
                        "Group '{}' references unknown source '{}'",
                        group.name, group.source
                    ))
                })?;
                let builder = DailySeriesBuilder::new(source.as_ref());
                let sequence = builder.build_with_cancel(
                    config.start_date,
                    config.end_date,
                    group,
                    self.cancel.as_deref(),
                )?;
                info!(group = %group.name, days = sequence.len(), "Built daily sequence");
                sequences.push(sequence);
            }

            if let Some(p) = progress {
                p.set_message("Joining daily sequences...");
            }
            let joined = InnerJoinEngine::join_all(sequences)?;
            info!(
                days = joined.len(),
                bands = joined.band_names().len(),
                "Joined daily sequences"
            );

            if let Some(p) = progress {
                p.set_message(&format!(
                    "Extracting statistics for {} regions over {} days...",
                    regions.len(),
                    joined.len()
                ));
            }
            let extractor = ZonalStatisticsExtractor::new(regions, &grid, config.scale);
            info!(active = extractor.active_regions(), "Prepared region masks");

            let assembler = SeriesAssembler::new(
                extractor,
                DerivedVariableComputer::new(config.humidity.clone()),
                MissingValueSubstitutor::new(config.output_fields.clone(), config.sentinel),
            );
            let table = assembler.assemble(&joined);
            info!(records = table.len(), "Assembled output table");

            if let Some(p) = progress {
                p.finish_with_message(&format!("Assembled {} records", table.len()));
            }
            Ok(table)
        })
    }

    fn resolve_grid(
        &self,
        config: &PipelineConfig,
        sources: &BTreeMap<String, Arc<dyn FrameSource>>,
    ) -> Result<crate::models::GridSpec> {
        let mut grid = None;
        for group in &config.groups {
            let source = sources.get(&group.source).ok_or_else(|| {
                PipelineError::Config(format!(
                    "Group '{}' references unknown source '{}'",
                    group.name, group.source
                ))
            })?;
            match &grid {
                None => grid = Some(source.grid().clone()),
                Some(g) if g != source.grid() => {
                    return Err(PipelineError::GridMismatch(format!(
                        "Source '{}' does not share the pipeline grid",
                        group.source
                    )));
                }
                _ => {}
            }
        }
        grid.ok_or_else(|| PipelineError::Config("No variable groups configured".to_string()))
    }
}

impl Default for DailyPipeline {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}
