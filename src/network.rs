//! Minimal mutable network working state: generators, loads, terminals.
//!
//! This is the slice of the grid model the sampler needs to mutate: element
//! identifiers, topology-connection status, power fields and generator bounds.
//! Elements iterate in insertion order, and that order is load-bearing: the
//! forecast-errors datasets are built against the same enumeration order, so
//! reordering elements silently misassigns samples. The ordering contract is
//! cross-system and cannot be verified locally.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// A generator in the network working state.
///
/// Power sign convention: `target_p` is in generation convention (positive =
/// producing), `terminal_p` is in consumption convention (positive = drawing
/// from the grid).
#[derive(Debug, Clone)]
pub struct Generator {
    /// Unique element identifier.
    pub id: String,
    /// Active power setpoint (MW, generation convention).
    pub target_p: f64,
    /// Active power at the terminal (MW, consumption convention).
    pub terminal_p: f64,
    /// Minimum active power bound (MW).
    pub min_p: f64,
    /// Maximum active power bound (MW).
    pub max_p: f64,
    /// Whether the element is part of the energized topology.
    pub connected: bool,
}

/// A load in the network working state.
#[derive(Debug, Clone)]
pub struct Load {
    /// Unique element identifier.
    pub id: String,
    /// Active power reference (MW).
    pub p0: f64,
    /// Reactive power reference (Mvar).
    pub q0: f64,
    /// Active power at the terminal (MW).
    pub terminal_p: f64,
    /// Reactive power at the terminal (Mvar).
    pub terminal_q: f64,
    /// Whether the element is part of the energized topology.
    pub connected: bool,
}

/// A network working state: one named snapshot of generator and load values,
/// mutated in place by the sampler.
#[derive(Debug, Clone)]
pub struct Network {
    id: String,
    working_state_id: String,
    generators: Vec<Generator>,
    loads: Vec<Load>,
}

/// CSV schema for network snapshots. For generators `p` is the target active
/// power and `q` is unused; for loads `p`/`q` are the references.
const SNAPSHOT_HEADER: &str = "kind,id,connected,p,q,terminal_p,terminal_q,min_p,max_p";

impl Network {
    /// Creates an empty network working state.
    pub fn new(id: impl Into<String>, working_state_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            working_state_id: working_state_id.into(),
            generators: Vec::new(),
            loads: Vec::new(),
        }
    }

    /// Network identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifier of the working state this snapshot represents. Read by the
    /// sampler for logging, never switched by it.
    pub fn working_state_id(&self) -> &str {
        &self.working_state_id
    }

    /// Appends a generator. Insertion order is preserved by all iterators.
    pub fn add_generator(&mut self, generator: Generator) {
        self.generators.push(generator);
    }

    /// Appends a load. Insertion order is preserved by all iterators.
    pub fn add_load(&mut self, load: Load) {
        self.loads.push(load);
    }

    /// All generator ids, in insertion order.
    pub fn generator_ids(&self) -> Vec<String> {
        self.generators.iter().map(|g| g.id.clone()).collect()
    }

    /// Ids of generators currently connected to the topology, in insertion
    /// order.
    pub fn connected_generator_ids(&self) -> Vec<String> {
        self.generators
            .iter()
            .filter(|g| g.connected)
            .map(|g| g.id.clone())
            .collect()
    }

    /// All load ids, in insertion order.
    pub fn load_ids(&self) -> Vec<String> {
        self.loads.iter().map(|l| l.id.clone()).collect()
    }

    /// Ids of loads currently connected to the topology, in insertion order.
    pub fn connected_load_ids(&self) -> Vec<String> {
        self.loads
            .iter()
            .filter(|l| l.connected)
            .map(|l| l.id.clone())
            .collect()
    }

    /// All generators, in insertion order.
    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    /// All loads, in insertion order.
    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    /// Looks up a generator by id.
    pub fn generator(&self, id: &str) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id == id)
    }

    /// Looks up a generator by id for mutation.
    pub fn generator_mut(&mut self, id: &str) -> Option<&mut Generator> {
        self.generators.iter_mut().find(|g| g.id == id)
    }

    /// Looks up a load by id.
    pub fn load(&self, id: &str) -> Option<&Load> {
        self.loads.iter().find(|l| l.id == id)
    }

    /// Looks up a load by id for mutation.
    pub fn load_mut(&mut self, id: &str) -> Option<&mut Load> {
        self.loads.iter_mut().find(|l| l.id == id)
    }

    /// Writes the working state as CSV to any writer.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing fails.
    pub fn write_csv(&self, writer: impl Write) -> io::Result<()> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(SNAPSHOT_HEADER.split(','))?;
        for g in &self.generators {
            wtr.write_record(&[
                "generator".to_string(),
                g.id.clone(),
                g.connected.to_string(),
                format!("{:.6}", g.target_p),
                String::new(),
                format!("{:.6}", g.terminal_p),
                String::new(),
                format!("{:.6}", g.min_p),
                format!("{:.6}", g.max_p),
            ])?;
        }
        for l in &self.loads {
            wtr.write_record(&[
                "load".to_string(),
                l.id.clone(),
                l.connected.to_string(),
                format!("{:.6}", l.p0),
                format!("{:.6}", l.q0),
                format!("{:.6}", l.terminal_p),
                format!("{:.6}", l.terminal_q),
                String::new(),
                String::new(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes the working state as CSV to a file.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if file creation or writing fails.
    pub fn write_csv_to_path(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }

    /// Parses a working state from CSV, preserving record order.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the CSV is malformed or a field does not
    /// parse.
    pub fn read_csv(
        id: impl Into<String>,
        working_state_id: impl Into<String>,
        reader: impl Read,
    ) -> io::Result<Self> {
        let mut network = Self::new(id, working_state_id);
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        for record in rdr.records() {
            let rec = record.map_err(io::Error::other)?;
            let kind = rec.get(0).unwrap_or("");
            match kind {
                "generator" => network.add_generator(Generator {
                    id: field(&rec, 1)?.to_string(),
                    connected: parse(&rec, 2)?,
                    target_p: parse(&rec, 3)?,
                    terminal_p: parse(&rec, 5)?,
                    min_p: parse(&rec, 7)?,
                    max_p: parse(&rec, 8)?,
                }),
                "load" => network.add_load(Load {
                    id: field(&rec, 1)?.to_string(),
                    connected: parse(&rec, 2)?,
                    p0: parse(&rec, 3)?,
                    q0: parse(&rec, 4)?,
                    terminal_p: parse(&rec, 5)?,
                    terminal_q: parse(&rec, 6)?,
                }),
                other => {
                    return Err(io::Error::other(format!(
                        "unknown element kind \"{other}\" in network snapshot"
                    )));
                }
            }
        }
        Ok(network)
    }

    /// Parses a working state from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the file cannot be read or the CSV is
    /// malformed.
    pub fn read_csv_from_path(
        id: impl Into<String>,
        working_state_id: impl Into<String>,
        path: &Path,
    ) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::read_csv(id, working_state_id, io::BufReader::new(file))
    }
}

fn field<'r>(rec: &'r csv::StringRecord, i: usize) -> io::Result<&'r str> {
    rec.get(i)
        .ok_or_else(|| io::Error::other(format!("missing column {i} in network snapshot")))
}

fn parse<T: std::str::FromStr>(rec: &csv::StringRecord, i: usize) -> io::Result<T> {
    field(rec, i)?
        .parse()
        .map_err(|_| io::Error::other(format!("invalid value \"{}\" in column {i}", rec.get(i).unwrap_or(""))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_network() -> Network {
        let mut network = Network::new("test-net", "ws-0");
        network.add_generator(Generator {
            id: "GEN1".to_string(),
            target_p: 100.0,
            terminal_p: -100.0,
            min_p: 0.0,
            max_p: 200.0,
            connected: true,
        });
        network.add_generator(Generator {
            id: "GEN2".to_string(),
            target_p: 50.0,
            terminal_p: -50.0,
            min_p: 10.0,
            max_p: 80.0,
            connected: false,
        });
        network.add_load(Load {
            id: "LOAD1".to_string(),
            p0: 30.0,
            q0: 5.0,
            terminal_p: 30.0,
            terminal_q: 5.0,
            connected: true,
        });
        network.add_load(Load {
            id: "LOAD2".to_string(),
            p0: 12.0,
            q0: 2.0,
            terminal_p: 12.0,
            terminal_q: 2.0,
            connected: true,
        });
        network
    }

    #[test]
    fn id_lists_preserve_insertion_order() {
        let network = sample_network();
        assert_eq!(network.generator_ids(), vec!["GEN1", "GEN2"]);
        assert_eq!(network.load_ids(), vec!["LOAD1", "LOAD2"]);
    }

    #[test]
    fn connected_lists_filter_deenergized_elements() {
        let network = sample_network();
        assert_eq!(network.connected_generator_ids(), vec!["GEN1"]);
        assert_eq!(network.connected_load_ids(), vec!["LOAD1", "LOAD2"]);
    }

    #[test]
    fn mutation_through_lookup_is_visible() {
        let mut network = sample_network();
        network
            .generator_mut("GEN1")
            .expect("GEN1 should exist")
            .target_p = -42.0;
        let p = network.generator("GEN1").map(|g| g.target_p);
        assert_eq!(p, Some(-42.0));
    }

    #[test]
    fn csv_round_trip_preserves_elements_and_order() {
        let network = sample_network();
        let mut buf = Vec::new();
        network.write_csv(&mut buf).expect("write should succeed");

        let parsed =
            Network::read_csv("test-net", "ws-0", buf.as_slice()).expect("read should succeed");
        assert_eq!(parsed.generator_ids(), network.generator_ids());
        assert_eq!(parsed.load_ids(), network.load_ids());

        let g2 = parsed.generator("GEN2").expect("GEN2 should round-trip");
        assert!(!g2.connected);
        assert_eq!(g2.min_p, 10.0);
        assert_eq!(g2.max_p, 80.0);

        let l1 = parsed.load("LOAD1").expect("LOAD1 should round-trip");
        assert_eq!(l1.p0, 30.0);
        assert_eq!(l1.q0, 5.0);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let csv = "kind,id,connected,p,q,terminal_p,terminal_q,min_p,max_p\n\
                   transformer,T1,true,0,0,0,0,0,0\n";
        assert!(Network::read_csv("n", "ws", csv.as_bytes()).is_err());
    }
}
