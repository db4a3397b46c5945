//! Staged per-network input artifact for the external sampler.
//!
//! One CSV per sampler instance, written exactly once at `init`: every
//! generator and load of the network in dataset order, with the values the
//! external tool perturbs. Generators come first, then loads, both in network
//! insertion order — the same order the forecast-errors datasets were built
//! against.

use std::io::{self, Write};

use crate::network::Network;

/// Column header of the staged input artifact. For generators `p` is the
/// target active power and `q` is empty; for loads `p`/`q` are the
/// references.
const INPUT_HEADER: &str = "kind,id,p,q,min_p,max_p,connected";

/// Writes the sampling input for `network` to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_sampling_input(network: &Network, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(INPUT_HEADER.split(','))?;
    for g in network.generators() {
        wtr.write_record(&[
            "generator".to_string(),
            g.id.clone(),
            format!("{:.6}", g.target_p),
            String::new(),
            format!("{:.6}", g.min_p),
            format!("{:.6}", g.max_p),
            g.connected.to_string(),
        ])?;
    }
    for l in network.loads() {
        wtr.write_record(&[
            "load".to_string(),
            l.id.clone(),
            format!("{:.6}", l.p0),
            format!("{:.6}", l.q0),
            String::new(),
            String::new(),
            l.connected.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Generator, Load};

    #[test]
    fn generators_precede_loads_in_dataset_order() {
        let mut network = Network::new("n", "ws");
        network.add_load(Load {
            id: "L1".to_string(),
            p0: 10.0,
            q0: 1.0,
            terminal_p: 10.0,
            terminal_q: 1.0,
            connected: true,
        });
        network.add_generator(Generator {
            id: "G1".to_string(),
            target_p: 80.0,
            terminal_p: -80.0,
            min_p: 0.0,
            max_p: 100.0,
            connected: true,
        });
        network.add_generator(Generator {
            id: "G2".to_string(),
            target_p: 20.0,
            terminal_p: -20.0,
            min_p: 0.0,
            max_p: 40.0,
            connected: false,
        });

        let mut buf = Vec::new();
        write_sampling_input(&network, &mut buf).expect("write should succeed");
        let text = String::from_utf8(buf).expect("artifact should be UTF-8");
        let kinds: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap_or(""))
            .collect();
        assert_eq!(kinds, vec!["generator", "generator", "load"]);
    }

    #[test]
    fn disconnected_elements_are_included_with_flag() {
        let mut network = Network::new("n", "ws");
        network.add_generator(Generator {
            id: "G1".to_string(),
            target_p: 5.0,
            terminal_p: -5.0,
            min_p: 0.0,
            max_p: 10.0,
            connected: false,
        });

        let mut buf = Vec::new();
        write_sampling_input(&network, &mut buf).expect("write should succeed");
        let text = String::from_utf8(buf).expect("artifact should be UTF-8");
        assert!(text.lines().any(|l| l.starts_with("generator,G1") && l.ends_with("false")));
    }
}
