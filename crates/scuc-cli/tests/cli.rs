use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

fn write_two_bus_instance(dir: &std::path::Path) {
    fs::write(
        dir.join("buses.csv"),
        "Bus,Demand 1,Zone\n0,40,0\n1,0,0\n",
    )
    .unwrap();
    fs::write(
        dir.join("lines.csv"),
        "Line,Source,Target,Reactance,Normal Flow Limit,Vulnerable?,Zone\n0,0,1,0.1,100,true,0\n",
    )
    .unwrap();
    fs::write(
        dir.join("generators.csv"),
        "Unit,Min Power,Max Power,Ramp-Down,Ramp-Up,Shutdown Ramp,Startup Ramp,Initial State,Bus,Always On,Min Uptime,Min Downtime,Cost Min Power,Price Segment 1,Price Segment 2,Price Segment 3,Offer Segment 1,Offer Segment 2,Offer Segment 3,Startup Cost\n\
         0,10,0,50,50,50,50,5,0,true,1,1,20,20,22,25,20,20,20,0\n",
    )
    .unwrap();
}

#[test]
fn tcuc_central_solves_a_minimal_instance() {
    let dir = tempfile::tempdir().unwrap();
    write_two_bus_instance(dir.path());

    let mut cmd = Command::cargo_bin("scuc").unwrap();
    cmd.args([
        "tcuc-central",
        dir.path().to_str().unwrap(),
        "1.0",
        "1.0",
    ]);
    cmd.assert().success().stdout(contains("tcuc-central"));
}

#[test]
fn rejects_a_missing_instance_directory() {
    let mut cmd = Command::cargo_bin("scuc").unwrap();
    cmd.args([
        "scuc-isf",
        "/nonexistent/instance/dir",
        "1.0",
        "1.0",
    ]);
    cmd.assert().failure();
}
