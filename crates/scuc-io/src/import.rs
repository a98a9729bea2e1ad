//! Instance CSV import: `buses.csv`, `lines.csv`, `generators.csv` in one
//! directory become a [`UnitCommitmentInstance`]. Column layouts follow
//! the fixed schemas every instance directory in this workspace ships
//! with; a short header mismatch is a configuration error, fatal at
//! startup, never a silent best-effort parse.

use std::path::Path;

use scuc_core::{
    Bus, BusId, CostSegment, Generator, GenId, LineId, ScucError, ScucResult, TransmissionLine,
    UnitCommitmentInstance, ZoneId,
};

/// Reads `<dir>/buses.csv`, `<dir>/lines.csv` and `<dir>/generators.csv`
/// and assembles them into a validated instance named after `dir`'s file
/// name.
pub fn import_instance(dir: &Path) -> ScucResult<UnitCommitmentInstance> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instance".to_string());
    let buses = import_buses(&dir.join("buses.csv"))?;
    let lines = import_lines(&dir.join("lines.csv"))?;
    let generators = import_generators(&dir.join("generators.csv"))?;
    let instance = UnitCommitmentInstance::new(name, buses, lines, generators);
    instance.validate()?;
    Ok(instance)
}

fn parse_f64(field: &str, context: &str) -> ScucResult<f64> {
    field
        .trim()
        .parse()
        .map_err(|_| ScucError::Parse(format!("{context}: expected a number, got '{field}'")))
}

fn parse_usize(field: &str, context: &str) -> ScucResult<usize> {
    field
        .trim()
        .parse()
        .map_err(|_| ScucError::Parse(format!("{context}: expected an integer, got '{field}'")))
}

fn parse_bool(field: &str) -> bool {
    matches!(field.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}

/// `Bus, Demand 1..T, Zone`.
fn import_buses(path: &Path) -> ScucResult<Vec<Bus>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| io_err(path, e))?;
    let headers = reader.headers().map_err(|e| io_err(path, e))?.clone();
    if headers.len() < 3 {
        return Err(ScucError::Validation(format!(
            "buses.csv: expected at least 3 columns, found {}",
            headers.len()
        )));
    }
    let n_demand = headers.len() - 2;

    let mut buses = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| io_err(path, e))?;
        let id = BusId::new(parse_usize(&record[0], "buses.csv Bus")?);
        let demand = (1..=n_demand)
            .map(|i| parse_f64(&record[i], "buses.csv Demand"))
            .collect::<ScucResult<Vec<f64>>>()?;
        let zone = ZoneId::new(parse_usize(&record[n_demand + 1], "buses.csv Zone")?);
        buses.push(Bus::new(id, demand, zone));
    }
    Ok(buses)
}

/// `Line, Source, Target, Reactance, Normal Flow Limit, [Emergency Flow
/// Limit,] Vulnerable?, Zone` (7 or 8 columns).
fn import_lines(path: &Path) -> ScucResult<Vec<TransmissionLine>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| io_err(path, e))?;
    let headers = reader.headers().map_err(|e| io_err(path, e))?.clone();
    let has_emergency = headers.len() == 8;
    if headers.len() != 7 && headers.len() != 8 {
        return Err(ScucError::Validation(format!(
            "lines.csv: expected 7 or 8 columns, found {}",
            headers.len()
        )));
    }

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| io_err(path, e))?;
        let id = LineId::new(parse_usize(&record[0], "lines.csv Line")?);
        let source = BusId::new(parse_usize(&record[1], "lines.csv Source")?);
        let target = BusId::new(parse_usize(&record[2], "lines.csv Target")?);
        let reactance = parse_f64(&record[3], "lines.csv Reactance")?;
        let normal = parse_f64(&record[4], "lines.csv Normal Flow Limit")?;
        let (emergency, vulnerable_idx) = if has_emergency {
            (parse_f64(&record[5], "lines.csv Emergency Flow Limit")?, 6)
        } else {
            (normal, 5)
        };
        let vulnerable = parse_bool(&record[vulnerable_idx]);
        let zone = ZoneId::new(parse_usize(&record[vulnerable_idx + 1], "lines.csv Zone")?);
        lines.push(TransmissionLine::new(
            id, source, target, reactance, normal, emergency, vulnerable, zone,
        ));
    }
    Ok(lines)
}

/// 20 columns: `Unit, Min Power, Max Power, Ramp-Down, Ramp-Up, Shutdown
/// Ramp, Startup Ramp, Initial State, Bus, Always On, Min Uptime, Min
/// Downtime, Cost Min Power, Price Segment 1..3, Offer Segment 1..3,
/// Startup Cost`. `Max Power` is recomputed from `Min Power` plus the
/// sum of the three offer segments rather than read from column 3.
fn import_generators(path: &Path) -> ScucResult<Vec<Generator>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| io_err(path, e))?;
    let headers = reader.headers().map_err(|e| io_err(path, e))?.clone();
    if headers.len() != 20 {
        return Err(ScucError::Validation(format!(
            "generators.csv: expected 20 columns, found {}",
            headers.len()
        )));
    }

    let mut generators = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| io_err(path, e))?;
        let id = GenId::new(parse_usize(&record[0], "generators.csv Unit")?);
        let p_min = parse_f64(&record[1], "generators.csv Min Power")?;
        let ramp_down = parse_f64(&record[3], "generators.csv Ramp-Down")?;
        let ramp_up = parse_f64(&record[4], "generators.csv Ramp-Up")?;
        let shutdown_ramp = parse_f64(&record[5], "generators.csv Shutdown Ramp")?;
        let startup_ramp = parse_f64(&record[6], "generators.csv Startup Ramp")?;
        let initial_on_hours = parse_f64(&record[7], "generators.csv Initial State")? as i32;
        let bus = BusId::new(parse_usize(&record[8], "generators.csv Bus")?);
        let always_on = parse_bool(&record[9]);
        let min_up_time = parse_usize(&record[10], "generators.csv Min Uptime")? as u32;
        let min_down_time = parse_usize(&record[11], "generators.csv Min Downtime")? as u32;
        let no_load_cost = parse_f64(&record[12], "generators.csv Cost Min Power")?;
        let prices = [
            parse_f64(&record[13], "generators.csv Price Segment 1")?,
            parse_f64(&record[14], "generators.csv Price Segment 2")?,
            parse_f64(&record[15], "generators.csv Price Segment 3")?,
        ];
        let offers = [
            parse_f64(&record[16], "generators.csv Offer Segment 1")?,
            parse_f64(&record[17], "generators.csv Offer Segment 2")?,
            parse_f64(&record[18], "generators.csv Offer Segment 3")?,
        ];
        let startup_cost = parse_f64(&record[19], "generators.csv Startup Cost")?;

        let cum0 = p_min + offers[0];
        let cum1 = cum0 + offers[1];
        let p_max = cum1 + offers[2];
        let cost_segments = [
            CostSegment { mw: p_min, marginal_cost: prices[0] },
            CostSegment { mw: cum0, marginal_cost: prices[1] },
            CostSegment { mw: cum1, marginal_cost: prices[2] },
        ];

        generators.push(Generator {
            id,
            bus,
            p_min,
            p_max,
            ramp_up,
            ramp_down,
            startup_ramp,
            shutdown_ramp,
            initial_power: if initial_on_hours > 0 { p_min } else { 0.0 },
            initial_on_hours: if always_on { i32::MAX } else { initial_on_hours },
            min_up_time,
            min_down_time,
            cost_segments,
            no_load_cost,
            startup_cost,
        });
    }
    Ok(generators)
}

fn io_err(path: &Path, err: csv::Error) -> ScucError {
    ScucError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {err}", path.display()),
    ))
}
