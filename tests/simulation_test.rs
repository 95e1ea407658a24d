use std::process::Command;

fn run_simulation(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_safe_intersection"))
        .args(args)
        .env("RUST_LOG", "warn,safe_intersection=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that the stop sign simulation runs to completion
#[test]
fn test_stop_sign_simulation_runs() {
    let output = run_simulation(&["--intersection", "stop-sign", "--cars", "30", "--seed", "3"]);

    assert!(
        output.status.success(),
        "Simulation failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    assert!(stderr.contains("SPAWNING CARS"), "No cars spawning message found");
    assert!(
        stderr.contains("Peak concurrent crossings:"),
        "Missing 'Peak concurrent crossings' statistic"
    );
}

/// Test that the traffic light simulation logs its statistics
#[test]
fn test_traffic_light_statistics_logged() {
    let output = run_simulation(&["--intersection", "traffic-light", "--cars", "30", "--seed", "5"]);

    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    for statistic in [
        "Total cars spawned:",
        "Total cars completed:",
        "Phase changes:",
        "Violations:",
        "Success rate:",
    ] {
        assert!(stderr.contains(statistic), "Missing '{}' statistic", statistic);
    }
}

/// Test that every car makes it through
#[test]
fn test_simulation_success_rate() {
    let output = run_simulation(&["--intersection", "traffic-light", "--cars", "25", "--seed", "9"]);

    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);

    // Format: "[2025-11-17T17:10:52Z INFO  safe_intersection::...] Success rate: 100.0%"
    let success_rate_line = stderr
        .lines()
        .find(|line| line.contains("Success rate:"))
        .expect("Could not find 'Success rate' line");

    let parts: Vec<&str> = success_rate_line.split("Success rate:").collect();
    let rate_str = parts
        .get(1)
        .and_then(|s| s.trim().strip_suffix('%'))
        .unwrap_or_else(|| {
            panic!(
                "Could not parse success rate from line: {}",
                success_rate_line
            )
        });

    let success_rate: f32 = rate_str
        .trim()
        .parse()
        .unwrap_or_else(|_| panic!("Could not parse '{}' as float", rate_str));

    assert_eq!(success_rate, 100.0, "Not every car completed");
}

/// Test that a zero-car run is rejected
#[test]
fn test_zero_cars_fails() {
    let output = run_simulation(&["--cars", "0"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("At least one car is required"));
}
