//! Real-data loading from files on disk.

use std::io::Write;

use simulapec_runner::{load_real_data, RealDataError, RunController, RunOutcome};

#[test]
fn bdd_scenario_six_hundred_lines_with_mixed_separators() {
    // GIVEN a file of 600 decimals, alternating comma and point separators,
    // with blank lines sprinkled in
    let expected: Vec<f64> = (0..600).map(|i| (i as f64 - 300.0) / 40.0).collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for (i, v) in expected.iter().enumerate() {
        let text = format!("{v}");
        let text = if i % 2 == 0 { text.replace('.', ",") } else { text };
        writeln!(file, "{text}").unwrap();
        if i % 50 == 0 {
            writeln!(file).unwrap();
            writeln!(file, "   ").unwrap();
        }
    }
    file.flush().unwrap();

    // WHEN the file is loaded
    let population = load_real_data(file.path()).unwrap();

    // THEN all 600 values come back in order and blanks are skipped
    assert_eq!(population.len(), 600);
    assert_eq!(population.values(), expected.as_slice());
    assert_eq!(population.source(), Some(file.path()));
}

#[test]
fn bdd_scenario_bad_line_is_reported_with_its_number() {
    // GIVEN a file whose fourth line is not a number
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.txt");
    std::fs::write(&path, "0,5\n1.5\n\n2,x\n").unwrap();

    // WHEN it is loaded
    let err = load_real_data(&path).unwrap_err();

    // THEN the error names line 4
    assert_eq!(
        err,
        RealDataError::Parse {
            line: 4,
            text: "2,x".into()
        }
    );
}

#[test]
fn bdd_scenario_loaded_file_drives_overlay() {
    // GIVEN a controller with a loaded file and an immediate confirmation
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.txt");
    let lines: Vec<String> = (0..120)
        .map(|i| format!("{}", (i % 13) as f64 - 6.0).replace('.', ","))
        .collect();
    std::fs::write(&path, lines.join("\n")).unwrap();

    let mut controller = RunController::new();
    controller
        .configure(&simulapec_runner::RawFields {
            population_size: "60".into(),
            admissible_error: "5".into(),
            base_tail_percent: "10".into(),
            max_tail_percent: "10".into(),
            tail_interval: "10".into(),
            n_iterations: "15".into(),
        })
        .unwrap();
    controller.load_real_data(load_real_data(&path).unwrap());
    controller.handle().confirm();

    // WHEN the run completes
    let outcome = controller.run(&simulapec_runner::NullObserver);

    // THEN the overlay is present
    match outcome {
        RunOutcome::Completed(result) => {
            let overlay = result.overlay.expect("overlay");
            assert_eq!(overlay.table().len(), result.grid.sample_sizes.len());
        }
        other => panic!("expected completion, got {other:?}"),
    }
}
