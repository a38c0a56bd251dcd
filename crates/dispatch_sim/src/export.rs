//! Run output: JSON snapshot and CSV trip log.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use dispatch_core::telemetry::{CompletedTripRecord, DispatchSnapshot};

fn create_output_file(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

pub fn export_snapshot_json(snapshot: &DispatchSnapshot, path: &Path) -> Result<()> {
    let file = create_output_file(path)?;
    serde_json::to_writer_pretty(file, snapshot).context("failed to write snapshot JSON")?;
    Ok(())
}

pub fn export_trips_csv(trips: &[CompletedTripRecord], path: &Path) -> Result<()> {
    let file = create_output_file(path)?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "trip_number",
        "worker",
        "requester",
        "origin_x",
        "origin_y",
        "destination_x",
        "destination_y",
        "fare",
        "payout",
        "commission",
        "matched_at",
        "completed_at",
        "trip_duration",
    ])?;

    for trip in trips {
        wtr.write_record([
            trip.trip_number.to_string(),
            trip.worker.0.to_string(),
            trip.requester.to_string(),
            trip.origin.x.to_string(),
            trip.origin.y.to_string(),
            trip.destination.x.to_string(),
            trip.destination.y.to_string(),
            format!("{:.2}", trip.fare),
            format!("{:.2}", trip.payout),
            format!("{:.2}", trip.commission),
            trip.matched_at.to_string(),
            trip.completed_at.to_string(),
            trip.trip_duration().to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
