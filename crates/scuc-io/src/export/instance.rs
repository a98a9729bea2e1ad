//! Writes an instance back out to the same three-file CSV layout
//! [`crate::import::import_instance`] reads, for round-tripping and for
//! inspecting a partitioned or rescaled instance.

use std::path::Path;

use scuc_core::{ScucError, ScucResult, UnitCommitmentInstance};

pub fn export_instance(instance: &UnitCommitmentInstance, dir: &Path) -> ScucResult<()> {
    std::fs::create_dir_all(dir)?;
    export_buses(instance, &dir.join("buses.csv"))?;
    export_lines(instance, &dir.join("lines.csv"))?;
    export_generators(instance, &dir.join("generators.csv"))?;
    Ok(())
}

fn export_buses(instance: &UnitCommitmentInstance, path: &Path) -> ScucResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    let periods = instance.periods();
    let mut header = vec!["Bus".to_string()];
    header.extend((1..=periods).map(|t| format!("Demand {t}")));
    header.push("Zone".to_string());
    writer.write_record(&header).map_err(csv_err)?;
    for bus in &instance.buses {
        let mut row = vec![bus.id.index().to_string()];
        row.extend(bus.demand.iter().map(|d| d.to_string()));
        row.push(bus.zone.index().to_string());
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

fn export_lines(instance: &UnitCommitmentInstance, path: &Path) -> ScucResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record([
            "Line",
            "Source",
            "Target",
            "Reactance",
            "Normal Flow Limit",
            "Emergency Flow Limit",
            "Vulnerable?",
            "Zone",
        ])
        .map_err(csv_err)?;
    for line in &instance.lines {
        writer
            .write_record([
                line.id.index().to_string(),
                line.source.index().to_string(),
                line.target.index().to_string(),
                line.reactance.to_string(),
                line.normal_capacity.to_string(),
                line.emergency_capacity.to_string(),
                line.vulnerable.to_string(),
                line.zone.index().to_string(),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

fn export_generators(instance: &UnitCommitmentInstance, path: &Path) -> ScucResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record([
            "Unit",
            "Min Power",
            "Max Power",
            "Ramp-Down",
            "Ramp-Up",
            "Shutdown Ramp",
            "Startup Ramp",
            "Initial State",
            "Bus",
            "Always On",
            "Min Uptime",
            "Min Downtime",
            "Cost Min Power",
            "Price Segment 1",
            "Price Segment 2",
            "Price Segment 3",
            "Offer Segment 1",
            "Offer Segment 2",
            "Offer Segment 3",
            "Startup Cost",
        ])
        .map_err(csv_err)?;
    for gen in &instance.generators {
        let segs = &gen.cost_segments;
        let offer1 = segs[1].mw - segs[0].mw;
        let offer2 = segs[2].mw - segs[1].mw;
        let offer3 = gen.p_max - segs[2].mw;
        let always_on = gen.initial_on_hours == i32::MAX;
        let initial_state = if always_on { 1 } else { gen.initial_on_hours };
        writer
            .write_record([
                gen.id.index().to_string(),
                gen.p_min.to_string(),
                gen.p_max.to_string(),
                gen.ramp_down.to_string(),
                gen.ramp_up.to_string(),
                gen.shutdown_ramp.to_string(),
                gen.startup_ramp.to_string(),
                initial_state.to_string(),
                gen.bus.index().to_string(),
                always_on.to_string(),
                gen.min_up_time.to_string(),
                gen.min_down_time.to_string(),
                gen.no_load_cost.to_string(),
                segs[0].marginal_cost.to_string(),
                segs[1].marginal_cost.to_string(),
                segs[2].marginal_cost.to_string(),
                offer1.to_string(),
                offer2.to_string(),
                offer3.to_string(),
                gen.startup_cost.to_string(),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_err(err: csv::Error) -> ScucError {
    ScucError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}
