#[path = "property/wip_invariant.rs"]
mod wip_invariant;

#[path = "property/scoring.rs"]
mod scoring;

#[path = "property/metric_repair.rs"]
mod metric_repair;
