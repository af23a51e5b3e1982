//! Supervision of parallel synthesis children.
//!
//! Parallel codegen enumerates every assignment of state groups to
//! pipeline stages and races one synthesis child per assignment. The
//! first success wins; every peer is then terminated, whole process
//! subtree included.
use std::{
    collections::VecDeque,
    fs,
    path::PathBuf,
    process::Child,
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use super::SolverError;

/// Enumerate every function from state groups to stages: `stages ^
/// groups` assignments, each a vector indexed by group.
pub fn enumerate_assignments(num_stages: usize, num_groups: usize) -> Vec<Vec<usize>> {
    let mut assignments = vec![];
    let mut current = vec![0; num_groups];

    loop {
        assignments.push(current.clone());

        // Advance the odometer; done once every digit wrapped.
        let mut position = 0;
        loop {
            if position == num_groups {
                return assignments;
            }
            current[position] += 1;
            if current[position] < num_stages {
                break;
            }
            current[position] = 0;
            position += 1;
        }
    }
}

/// One spawned synthesis child and where its output lands.
pub struct RunningTask {
    pub index: usize,
    pub child: Child,
    pub output_file: PathBuf,
}

/// The winner (or last failure) of a parallel race.
pub struct RaceOutcome {
    pub success: bool,
    pub output: String,
    pub winner: Option<usize>,
}

/// First-success supervisor over synthesis children. Children share no
/// state; they communicate through exit codes and their output files.
pub struct Supervisor {
    pub worker_cap: usize,
    pub grace: Duration,
    pub poll_interval: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Supervisor {
            worker_cap: 8,
            grace: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl Supervisor {
    /// Race all tasks produced by `spawn`, bounded by the worker cap.
    /// `spawn(index)` starts the child for assignment `index`. Returns as
    /// soon as one child succeeds; if every child fails, the output of
    /// the last failure is returned.
    pub fn race(
        &self,
        task_count: usize,
        mut spawn: impl FnMut(usize) -> Result<RunningTask, SolverError>,
    ) -> Result<RaceOutcome, SolverError> {
        let mut pending: VecDeque<usize> = (0..task_count).collect();
        let mut running: Vec<RunningTask> = vec![];
        let mut last_failure = String::new();

        loop {
            while running.len() < self.worker_cap {
                let Some(index) = pending.pop_front() else {
                    break;
                };
                match spawn(index) {
                    Ok(task) => running.push(task),
                    Err(error) => {
                        for peer in &mut running {
                            terminate_subtree(peer, self.grace);
                        }
                        return Err(error);
                    }
                }
            }

            if running.is_empty() {
                return Ok(RaceOutcome {
                    success: false,
                    output: last_failure,
                    winner: None,
                });
            }

            let mut finished = None;
            for (slot, task) in running.iter_mut().enumerate() {
                if let Some(status) = task.child.try_wait()? {
                    finished = Some((slot, status.success()));
                    break;
                }
            }

            let Some((slot, success)) = finished else {
                thread::sleep(self.poll_interval);
                continue;
            };

            let task = running.remove(slot);
            let output = fs::read_to_string(&task.output_file).unwrap_or_default();

            if success {
                info!("assignment #{} succeeded, terminating peers", task.index);
                for peer in &mut running {
                    terminate_subtree(peer, self.grace);
                }
                return Ok(RaceOutcome {
                    success: true,
                    output,
                    winner: Some(task.index),
                });
            }

            debug!("assignment #{} failed, waiting for others", task.index);
            last_failure = output;
        }
    }
}

/// Terminate a child and all of its descendants: SIGTERM to the process
/// group, a grace window, then SIGKILL.
fn terminate_subtree(task: &mut RunningTask, grace: Duration) {
    let group = task.child.id() as i32;

    unsafe {
        libc::killpg(group, libc::SIGTERM);
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        match task.child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(error) => {
                warn!("failed to reap assignment #{}: {error}", task.index);
                return;
            }
        }
    }

    unsafe {
        libc::killpg(group, libc::SIGKILL);
    }
    let _ = task.child.wait();
}
