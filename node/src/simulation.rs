//! Simulated clinic feeding the ledger.
//!
//! Doctors produce randomly generated, signed reports at a random interval
//! while the miner runs rounds back to back.

use medchain_core::{BlockError, Ed25519Scheme, HealthReport, LedgerError, ReportError, Vitals};
use miner::{Miner, RoundSummary};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::blockchain::Chain;
use crate::config::NodeConfig;
use crate::history::PatientHistoryTracker;
use crate::mempool::{MempoolError, TransactionPool};
use crate::network::NodeNetwork;
use crate::wallet::{DoctorWallet, PatientWallet};

pub const SYMPTOMS: [&str; 5] = ["cough", "fever", "fatigue", "headache", "nausea"];
pub const DIAGNOSES: [&str; 5] = ["flu", "cold", "migraine", "infection", "gastritis"];
pub const NOTES: [&str; 5] = [
    "Prescribed rest and fluids.",
    "Advised follow-up after 3 days.",
    "Recommended blood test.",
    "Referred to specialist.",
    "No critical signs.",
];

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Simulation needs at least one patient and one doctor")]
    NoParticipants,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Mempool error: {0}")]
    Mempool(#[from] MempoolError),
}

impl From<ReportError> for SimulationError {
    fn from(e: ReportError) -> Self {
        SimulationError::Ledger(e.into())
    }
}

impl From<BlockError> for SimulationError {
    fn from(e: BlockError) -> Self {
        SimulationError::Ledger(e.into())
    }
}

/// Produces signed reports from a fixed roster of doctors and patients
pub struct ReportGenerator {
    patients: Vec<PatientWallet>,
    doctors: Vec<DoctorWallet>,
}

impl ReportGenerator {
    pub fn new(num_patients: usize, num_doctors: usize) -> Self {
        Self {
            patients: (0..num_patients)
                .map(|i| PatientWallet::new(format!("patient_{i}")))
                .collect(),
            doctors: (0..num_doctors)
                .map(|i| DoctorWallet::new(format!("doctor_{i}")))
                .collect(),
        }
    }

    pub fn patients(&self) -> &[PatientWallet] {
        &self.patients
    }

    pub fn doctors(&self) -> &[DoctorWallet] {
        &self.doctors
    }

    pub fn random_vitals<R: Rng + ?Sized>(rng: &mut R) -> Vitals {
        Vitals {
            blood_pressure: format!("{}/{}", rng.gen_range(110..=140), rng.gen_range(70..=90)),
            heart_rate: rng.gen_range(60..=100),
            spo2: format!("{}%", rng.gen_range(95..=100)),
            temperature: format!("{:.1} F", rng.gen_range(97.0..=102.0)),
        }
    }

    /// A random report about `patient_id`, signed by `doctor`
    pub fn generate_for<R: Rng + ?Sized>(
        patient_id: &str,
        doctor: &DoctorWallet,
        rng: &mut R,
    ) -> Result<HealthReport, ReportError> {
        let symptoms = pick(rng, &SYMPTOMS);
        let diagnosis = pick(rng, &DIAGNOSES);
        let vitals = Self::random_vitals(rng);
        let notes = pick(rng, &NOTES);

        let mut report = HealthReport::new(
            patient_id,
            doctor.doctor_id(),
            symptoms,
            diagnosis,
            vitals,
            notes,
        );
        doctor.sign_report(&mut report)?;
        Ok(report)
    }

    /// A random report for a random patient by a random doctor
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<HealthReport, SimulationError> {
        let patient = self.patients.choose(rng).ok_or(SimulationError::NoParticipants)?;
        let doctor = self.doctors.choose(rng).ok_or(SimulationError::NoParticipants)?;
        Ok(Self::generate_for(patient.patient_id(), doctor, rng)?)
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, options: &[&'static str]) -> &'static str {
    options[rng.gen_range(0..options.len())]
}

/// Totals over the rounds a simulation has run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub rounds: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Rounds that ended without any gate decision
    pub undecided: u64,
    pub timed_out: u64,
}

impl SimulationStats {
    fn record(&mut self, summary: &RoundSummary) {
        self.rounds += 1;
        match summary.decision() {
            Some((_, outcome)) if outcome.is_accepted() => self.accepted += 1,
            Some(_) => self.rejected += 1,
            None => self.undecided += 1,
        }
        if summary.timed_out {
            self.timed_out += 1;
        }
    }
}

/// Wires pool, chain, gate, history and miner together and drives rounds
pub struct Simulation {
    config: NodeConfig,
    pool: Arc<TransactionPool>,
    chain: Arc<Chain>,
    history: Arc<PatientHistoryTracker>,
    miner: Miner,
    generator: Arc<ReportGenerator>,
    stopped: AtomicBool,
}

impl Simulation {
    pub fn new(config: NodeConfig) -> Result<Self, SimulationError> {
        let mining = &config.mining;
        let sim = &config.simulation;
        if sim.patients == 0 || sim.doctors == 0 {
            return Err(SimulationError::NoParticipants);
        }

        let scheme = Arc::new(Ed25519Scheme::new());
        let pool = Arc::new(TransactionPool::new());
        let chain = Arc::new(Chain::new(mining.difficulty)?);
        let history = Arc::new(PatientHistoryTracker::new());
        let network = Arc::new(NodeNetwork::new(chain.clone(), history.clone(), scheme.clone()));

        let mut miner = Miner::new(
            mining.workers,
            mining.worker_config(),
            pool.clone(),
            chain.clone(),
            network,
            scheme,
        );
        if let Some(timeout) = mining.round_timeout {
            miner = miner.with_round_timeout(timeout);
        }

        let generator = Arc::new(ReportGenerator::new(sim.patients, sim.doctors));
        for doctor in generator.doctors() {
            debug!("{}", doctor);
        }

        Ok(Self {
            config,
            pool,
            chain,
            history,
            miner,
            generator,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<TransactionPool> {
        &self.pool
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    pub fn history(&self) -> &Arc<PatientHistoryTracker> {
        &self.history
    }

    /// Generate `count` reports and add them to the pool right away
    pub fn submit_reports(&self, count: usize) -> Result<(), SimulationError> {
        let mut rng = rand::thread_rng();
        for _ in 0..count {
            let report = self.generator.generate(&mut rng)?;
            self.pool.add_report(&report)?;
        }
        Ok(())
    }

    /// Start the background report producer
    pub fn spawn_producer(&self) -> JoinHandle<()> {
        let pool = Arc::clone(&self.pool);
        let generator = Arc::clone(&self.generator);
        let min = self.config.simulation.report_interval_min;
        let max = self.config.simulation.report_interval_max;

        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            loop {
                match generator.generate(&mut rng) {
                    Ok(report) => {
                        if let Err(e) = pool.add_report(&report) {
                            error!(error = %e, "Failed to queue generated report");
                        } else {
                            debug!(
                                patient_id = %report.patient_id,
                                doctor_id = %report.doctor_id,
                                pool_size = pool.size(),
                                "Generated health report"
                            );
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to generate report"),
                }
                tokio::time::sleep(rng.gen_range(min..=max)).await;
            }
        })
    }

    /// Run rounds until the configured count is reached or `stop` is called
    pub async fn run(&self) -> SimulationStats {
        let producer = self.spawn_producer();
        info!("Health report generator started");

        let stats = self.run_rounds(self.config.simulation.rounds).await;

        producer.abort();
        stats
    }

    /// Run up to `rounds` rounds without a producer; unbounded when `None`
    pub async fn run_rounds(&self, rounds: Option<u64>) -> SimulationStats {
        let mut stats = SimulationStats::default();
        while !self.is_stopped() && rounds.map_or(true, |limit| stats.rounds < limit) {
            let summary = self.miner.run_round().await;
            stats.record(&summary);
            info!(
                round = stats.rounds,
                chain_length = self.chain.len(),
                pool_size = self.pool.size(),
                "Mining round finished"
            );

            if self.is_stopped() || rounds.map_or(false, |limit| stats.rounds >= limit) {
                break;
            }
            tokio::time::sleep(self.config.simulation.round_pause).await;
            info!("Starting next mining round...");
        }
        stats
    }

    /// Stop after the current round, cancelling it
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.miner.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_core::{SignatureError, SignatureScheme};
    use std::time::Duration;

    #[test]
    fn test_generated_report_is_signed_and_in_range() {
        let generator = ReportGenerator::new(4, 2);
        let mut rng = StdRng::seed_from_u64(7);
        let scheme = Ed25519Scheme::new();

        for _ in 0..20 {
            let report = generator.generate(&mut rng).unwrap();
            assert!(report.verify_signature(&scheme));
            assert!(SYMPTOMS.contains(&report.symptoms.as_str()));
            assert!(DIAGNOSES.contains(&report.diagnosis.as_str()));
            assert!(NOTES.contains(&report.notes.as_str()));
            assert!((60..=100).contains(&report.vitals.heart_rate));

            let (sys, dia) = report.vitals.blood_pressure.split_once('/').unwrap();
            assert!((110..=140).contains(&sys.parse::<u32>().unwrap()));
            assert!((70..=90).contains(&dia.parse::<u32>().unwrap()));

            let temp: f64 = report.vitals.temperature.trim_end_matches(" F").parse().unwrap();
            assert!((97.0..=102.0).contains(&temp));
        }
    }

    #[test]
    fn test_report_author_key_matches_wallet() {
        let generator = ReportGenerator::new(1, 1);
        let doctor = &generator.doctors()[0];
        let report =
            ReportGenerator::generate_for("patient_0", doctor, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(report.doctor_id, "doctor_0");
        assert_eq!(
            report.doctor_public_key_serialized.as_deref(),
            Some(doctor.public_key_serialized())
        );
        assert_eq!(
            Ed25519Scheme::new()
                .deserialize_public_key(doctor.public_key_serialized())
                .unwrap(),
            doctor.public_key()
        );
    }

    #[test]
    fn test_empty_roster_is_refused() {
        let generator = ReportGenerator::new(0, 1);
        assert!(matches!(
            generator.generate(&mut rand::thread_rng()),
            Err(SimulationError::NoParticipants)
        ));
    }

    #[test]
    fn test_core_failures_surface_as_ledger_errors() {
        let err = SimulationError::from(ReportError::Signature(SignatureError::InvalidKey(
            "short".to_string(),
        )));
        assert!(matches!(&err, SimulationError::Ledger(e) if e.is_transaction_local()));

        let err = SimulationError::from(BlockError::InvalidPreviousHash {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        });
        assert!(matches!(&err, SimulationError::Ledger(e) if !e.is_transaction_local()));
    }

    fn quick_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.mining.workers = 2;
        config.mining.difficulty = 1;
        config.mining.block_size = 2;
        config.mining.pull_size = 4;
        config.mining.backoff = Duration::from_millis(5);
        config.mining.round_timeout = Some(Duration::from_secs(10));
        config.simulation.round_pause = Duration::from_millis(1);
        config
    }

    #[tokio::test]
    async fn test_rounds_grow_the_chain() {
        let mut config = quick_config();
        // The losing worker hands its reports back for the next round
        config.mining.preemption_policy = miner::PreemptionPolicy::Requeue;
        let simulation = Simulation::new(config).unwrap();
        simulation.submit_reports(4).unwrap();

        let stats = simulation.run_rounds(Some(2)).await;
        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.accepted, 2);
        assert_eq!(simulation.chain().len(), 3);
        assert_eq!(simulation.history().total_records(), 4);
        assert!(simulation.chain().validate().is_ok());
    }

    #[tokio::test]
    async fn test_stop_ends_starved_round() {
        let simulation = Arc::new(Simulation::new(quick_config()).unwrap());
        let stopper = Arc::clone(&simulation);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.stop();
        });

        let stats = simulation.run_rounds(None).await;
        handle.await.unwrap();
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.undecided, 1);
        assert_eq!(simulation.chain().len(), 1);
    }
}
