//! End-to-end run of the `grid-sampler` binary against a stub external tool.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::Command;

use grid_sampler::network::{Generator, Load, Network};

/// Stub standing in for the external `mcla` binary: checks its positional
/// inputs exist in the working directory and emits a deterministic batch of
/// the requested size.
const STUB_TOOL: &str = r#"#!/bin/sh
set -e
input="$1"
fe="$2"
out="$3"
n="$4"
test -f "$input" || exit 2
test -f "$fe" || exit 2
i=0
while [ "$i" -lt "$n" ]; do
    p=$((10 + i))
    echo "gen_p,$i,$p" >> "$out"
    echo "load_p,$i,5.5" >> "$out"
    echo "load_q,$i,1.25" >> "$out"
    i=$((i + 1))
done
echo "sample,gen,load" > printSamples.csv
"#;

struct Fixture {
    root: tempfile::TempDir,
}

impl Fixture {
    fn new(available_samples: usize) -> Self {
        let root = tempfile::tempdir().expect("fixture root should be created");

        let bin_dir = root.path().join("bin");
        fs::create_dir_all(&bin_dir).expect("bin dir should be created");
        let tool = bin_dir.join("mcla");
        fs::write(&tool, STUB_TOOL).expect("stub tool should be written");
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755))
            .expect("stub tool should be executable");

        let analysis_dir = root.path().join("fe-store").join("fea-1");
        fs::create_dir_all(&analysis_dir).expect("analysis dir should be created");
        fs::write(analysis_dir.join("offline_samples_DACF.dat"), b"dataset")
            .expect("dataset should be written");
        fs::write(
            analysis_dir.join("parameters_DACF.toml"),
            format!("n_samples = {available_samples}\n"),
        )
        .expect("parameters should be written");

        let mut network = Network::new("case39", "default");
        network.add_generator(Generator {
            id: "GEN1".to_string(),
            target_p: 90.0,
            terminal_p: -90.0,
            min_p: 0.0,
            max_p: 200.0,
            connected: true,
        });
        network.add_load(Load {
            id: "LOAD1".to_string(),
            p0: 30.0,
            q0: 6.0,
            terminal_p: 30.0,
            terminal_q: 6.0,
            connected: true,
        });
        network
            .write_csv_to_path(&root.path().join("case39.csv"))
            .expect("network snapshot should be written");

        fs::write(
            root.path().join("config.toml"),
            format!(
                "[sampler]\ntmp_dir = \"{}\"\nbinaries_dir = \"{}\"\n",
                root.path().join("tmp").display(),
                bin_dir.display()
            ),
        )
        .expect("config should be written");

        Self { root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn run(&self, samples: &str, analysis: &str) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_grid-sampler"))
            .args([
                "--config",
                &self.path("config.toml").display().to_string(),
                "--network",
                &self.path("case39.csv").display().to_string(),
                "--fe-store",
                &self.path("fe-store").display().to_string(),
                "--analysis",
                analysis,
                "--samples",
                samples,
                "--out",
                &self.path("sampled.csv").display().to_string(),
            ])
            .output()
            .expect("grid-sampler process should run")
    }
}

#[test]
fn sampling_run_updates_the_network_snapshot() {
    let fixture = Fixture::new(5);
    let output = fixture.run("2", "fea-1");
    assert!(
        output.status.success(),
        "sampler run failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let sampled = Network::read_csv_from_path("case39", "default", &fixture.path("sampled.csv"))
        .expect("sampled snapshot should parse");

    // Last drawn sample (index 1): gen_p = 11, negated into the setpoint.
    let g = sampled.generator("GEN1").expect("GEN1 should survive");
    assert_eq!(g.target_p, -11.0);
    assert_eq!(g.terminal_p, 11.0);

    let l = sampled.load("LOAD1").expect("LOAD1 should survive");
    assert_eq!(l.p0, 5.5);
    assert_eq!(l.q0, 1.25);
}

#[test]
fn requesting_more_samples_than_available_fails() {
    let fixture = Fixture::new(3);
    let output = fixture.run("4", "fea-1");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("requested 4 samples, available 3"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn missing_analysis_fails_with_descriptive_error() {
    let fixture = Fixture::new(5);
    let output = fixture.run("2", "no-such-analysis");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no forecast offline samples data available"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn staged_input_lands_in_configured_tmp_dir() {
    let fixture = Fixture::new(5);
    let output = fixture.run("1", "fea-1");
    assert!(
        output.status.success(),
        "sampler run failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let tmp = fixture.path("tmp");
    let staged: Vec<_> = fs::read_dir(&tmp)
        .expect("tmp dir should exist")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        staged.iter().any(|n| n.starts_with("mcsinput_case39_DACF_")),
        "no staged input in {}: {staged:?}",
        tmp.display()
    );
}
