//! Q-learning trainer
//!
//! Runs a fixed budget of episodes from a start cell. Each step asks the
//! epsilon-greedy policy for an action, moves the agent and applies the
//! temporal-difference update
//!
//! `Q(s, a) <- Q(s, a) + lr * (r + discount * max_a' Q(s', a') - Q(s, a))`
//!
//! to the value table. An episode ends as soon as the agent stands on a
//! terminal cell (wall or goal).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::environment::{Env, Movement, Pos, Terminal};
use crate::error::{Error, Result};
use crate::policy::EpsilonGreedy;
use crate::value_table::ValueTable;

/// Hyper-parameters of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Probability of exploiting the best-known action. `1.0` requires a
    /// negative floor reward, otherwise untrained ties never break.
    pub epsilon: f32,
    pub discount_factor: f32,
    pub learning_rate: f32,
    pub episodes: usize,
    /// Cuts an episode short after this many steps. `None` runs every
    /// episode until a terminal cell is reached.
    pub max_steps_per_episode: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epsilon: 0.95,
            discount_factor: 0.8,
            learning_rate: 0.9,
            episodes: 1500,
            max_steps_per_episode: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        EpsilonGreedy::new(self.epsilon)?;
        self.validate_schedule()
    }

    /// Checks everything but epsilon.
    fn validate_schedule(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.discount_factor) {
            return Err(Error::invalid_config(format!(
                "discount factor must be within [0, 1), got {}",
                self.discount_factor
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::invalid_config(format!(
                "learning rate must be within (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.max_steps_per_episode == Some(0) {
            return Err(Error::invalid_config("max steps per episode must be positive"));
        }
        Ok(())
    }
}

/// Cooperative stop signal, checked by the trainer before every episode and
/// every step.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeStats {
    pub episode: usize,
    pub steps: usize,
    pub total_reward: i64,
    /// `None` when the episode hit the step limit or was cancelled.
    pub ending: Option<Terminal>,
    pub max_td_error: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeStats>,
    pub cancelled: bool,
}

impl TrainingReport {
    pub fn episodes_completed(&self) -> usize {
        self.episodes.len()
    }

    pub fn goal_count(&self) -> usize {
        self.episodes
            .iter()
            .filter(|stats| stats.ending == Some(Terminal::Goal))
            .count()
    }

    pub fn goal_rate(&self) -> f64 {
        if self.episodes.is_empty() {
            0.0
        } else {
            self.goal_count() as f64 / self.episodes.len() as f64
        }
    }
}

/// Applies one temporal-difference update to `table` and returns the
/// temporal difference used.
pub fn q_learning_update(
    table: &mut ValueTable,
    state: Pos,
    action: Movement,
    reward: f32,
    next: Pos,
    learning_rate: f32,
    discount_factor: f32,
) -> f32 {
    let old_value = table.get(state, action);
    let temporal_difference = reward + discount_factor * table.max_value(next) - old_value;
    table.set(state, action, old_value + learning_rate * temporal_difference);
    temporal_difference
}

pub struct Trainer<'a> {
    env: &'a Env,
    config: TrainingConfig,
    policy: EpsilonGreedy,
    cancel: Option<CancelFlag>,
}

impl<'a> Trainer<'a> {
    pub fn new(env: &'a Env, config: TrainingConfig) -> Result<Self> {
        let policy = EpsilonGreedy::new(config.epsilon)?;
        config.validate_schedule()?;
        if config.epsilon >= 1.0 && env.rewards().floor >= 0 {
            // ties on an untrained table never break when floor steps cost nothing
            return Err(Error::invalid_config(format!(
                "epsilon 1.0 needs a negative floor reward, got {}",
                env.rewards().floor
            )));
        }
        Ok(Trainer {
            env,
            config,
            policy,
            cancel: None,
        })
    }

    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Trains `table` in place over the configured number of episodes.
    pub fn train<R: Rng + ?Sized>(
        &self,
        table: &mut ValueTable,
        start: Pos,
        rng: &mut R,
    ) -> Result<TrainingReport> {
        self.env.check_bounds(start)?;
        table.check_shape(self.env)?;

        let mut report = TrainingReport::default();
        for episode in 0..self.config.episodes {
            if self.is_cancelled() {
                warn!(episode, "training cancelled");
                report.cancelled = true;
                break;
            }

            debug!(episode, "starting episode");
            let stats = self.run_episode(episode, table, start, rng);
            debug!(
                episode,
                steps = stats.steps,
                reward = stats.total_reward,
                ending = ?stats.ending,
                "finished episode"
            );
            let interrupted = stats.ending.is_none() && self.is_cancelled();
            report.episodes.push(stats);
            if interrupted {
                warn!(episode, "training cancelled during an episode");
                report.cancelled = true;
                break;
            }
        }

        info!(
            episodes = report.episodes_completed(),
            goal_rate = report.goal_rate(),
            "completed training"
        );
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelFlag::is_cancelled)
    }

    /// Runs one episode. Stops early at the step limit or when the cancel
    /// flag is raised, leaving `ending` as `None`.
    fn run_episode<R: Rng + ?Sized>(
        &self,
        episode: usize,
        table: &mut ValueTable,
        start: Pos,
        rng: &mut R,
    ) -> EpisodeStats {
        let mut agent = Agent::new(start);
        let mut ending = self.env.terminal(start);
        let mut max_td_error = 0.0f32;

        while ending.is_none() {
            if let Some(limit) = self.config.max_steps_per_episode {
                if agent.steps >= limit {
                    break;
                }
            }
            if self.is_cancelled() {
                break;
            }

            let state = agent.pos;
            let action = self.policy.next_action(table, state, rng);
            let (reward, terminal) = agent.r#move(self.env, action);
            let temporal_difference = q_learning_update(
                table,
                state,
                action,
                reward as f32,
                agent.pos,
                self.config.learning_rate,
                self.config.discount_factor,
            );
            max_td_error = max_td_error.max(temporal_difference.abs());
            ending = terminal;
        }

        EpisodeStats {
            episode,
            steps: agent.steps,
            total_reward: agent.reward,
            ending,
            max_td_error,
        }
    }
}

/// Convenience wrapper around [`Trainer`] without cancellation.
pub fn train<R: Rng + ?Sized>(
    env: &Env,
    table: &mut ValueTable,
    start: Pos,
    config: &TrainingConfig,
    rng: &mut R,
) -> Result<TrainingReport> {
    Trainer::new(env, *config)?.train(table, start, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Rewards;
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn small_env() -> Env {
        Env::build(&[vec![1, 1, 2], vec![1, 0, 1], vec![1, 1, 1]], Rewards::default()).unwrap()
    }

    fn config(episodes: usize) -> TrainingConfig {
        TrainingConfig {
            episodes,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_q_learning_update_arithmetic() {
        let mut table = ValueTable::new(1, 2);
        let state = Pos::new(0, 0);
        let next = Pos::new(0, 1);

        let td = q_learning_update(&mut table, state, Movement::Right, 500.0, next, 0.9, 0.8);
        assert_eq!(td, 500.0);
        assert!((table.get(state, Movement::Right) - 450.0).abs() < 1e-4);

        // Q = 0 + 0.5 * (-10 + 0.8 * 100 - 0) = 35
        let mut table = ValueTable::new(1, 2);
        table.set(next, Movement::Down, 100.0);
        let td = q_learning_update(&mut table, state, Movement::Right, -10.0, next, 0.5, 0.8);
        assert!((td - 70.0).abs() < 1e-4);
        assert!((table.get(state, Movement::Right) - 35.0).abs() < 1e-4);
    }

    #[test]
    fn test_terminal_cells_never_updated() {
        let env = small_env();
        let mut table = ValueTable::for_env(&env);
        let mut rng = StdRng::seed_from_u64(42);
        train(&env, &mut table, Pos::new(2, 0), &config(300), &mut rng).unwrap();

        for pos in [Pos::new(0, 2), Pos::new(1, 1)] {
            assert_eq!(table.max_value(pos), 0.0);
            for action in Movement::ALL.iter() {
                assert_eq!(table.get(pos, *action), 0.0);
            }
        }
        assert!(table.is_finite());
    }

    #[test]
    fn test_training_is_deterministic_for_a_seed() {
        let env = small_env();
        let run = |seed| {
            let mut table = ValueTable::for_env(&env);
            let mut rng = StdRng::seed_from_u64(seed);
            let report = train(&env, &mut table, Pos::new(2, 0), &config(200), &mut rng).unwrap();
            (table, report)
        };

        let (table_a, report_a) = run(9);
        let (table_b, report_b) = run(9);
        assert_eq!(table_a, table_b);
        assert_eq!(report_a, report_b);
    }

    #[test]
    fn test_report_counts_episodes() {
        let env = small_env();
        let mut table = ValueTable::for_env(&env);
        let mut rng = StdRng::seed_from_u64(5);
        let report = train(&env, &mut table, Pos::new(2, 0), &config(250), &mut rng).unwrap();

        assert_eq!(report.episodes_completed(), 250);
        assert!(!report.cancelled);
        assert!(report.goal_rate() > 0.5, "goal rate {}", report.goal_rate());
        for (i, stats) in report.episodes.iter().enumerate() {
            assert_eq!(stats.episode, i);
            assert!(stats.steps > 0);
            assert!(stats.ending.is_some());
        }
    }

    #[test]
    fn test_cancelled_before_first_episode() {
        let env = small_env();
        let mut table = ValueTable::for_env(&env);
        let mut rng = StdRng::seed_from_u64(1);
        let flag = CancelFlag::new();
        flag.cancel();

        let report = Trainer::new(&env, config(100))
            .unwrap()
            .with_cancel_flag(flag.clone())
            .train(&mut table, Pos::new(2, 0), &mut rng)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.episodes_completed(), 0);
        assert_eq!(table, ValueTable::for_env(&env));
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_cancel_interrupts_running_episode() {
        let flag = CancelFlag::new();
        let worker_flag = flag.clone();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let rewards = Rewards { wall: -5, floor: 0, goal: 5 };
            let env = Env::build(&[vec![1, 1, 2]], rewards).unwrap();
            // built directly: `Trainer::new` refuses this config because the
            // episode keeps bumping the top edge and never ends on its own
            let trainer = Trainer {
                env: &env,
                config: TrainingConfig {
                    epsilon: 1.0,
                    episodes: 1,
                    ..TrainingConfig::default()
                },
                policy: EpsilonGreedy::greedy(),
                cancel: Some(worker_flag),
            };
            let mut table = ValueTable::for_env(&env);
            let mut rng = StdRng::seed_from_u64(4);
            let _ = tx.send(trainer.train(&mut table, Pos::new(0, 0), &mut rng));
        });

        thread::sleep(Duration::from_millis(50));
        flag.cancel();
        let report = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("training did not stop after cancel")
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.episodes_completed(), 1);
        assert_eq!(report.episodes[0].ending, None);
        assert!(report.episodes[0].steps > 0);
    }

    #[test]
    fn test_greedy_training_needs_floor_cost() {
        let free_floor = Rewards { wall: -5, floor: 0, goal: 5 };
        let env = Env::build(&[vec![1, 1, 2]], free_floor).unwrap();
        let greedy = TrainingConfig {
            epsilon: 1.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            Trainer::new(&env, greedy),
            Err(Error::InvalidConfiguration { .. })
        ));
        assert!(Trainer::new(&env, TrainingConfig::default()).is_ok());

        let env = Env::build(&[vec![1, 1, 2]], Rewards::default()).unwrap();
        let mut table = ValueTable::for_env(&env);
        let mut rng = StdRng::seed_from_u64(6);
        let report = Trainer::new(&env, TrainingConfig { episodes: 5, ..greedy })
            .unwrap()
            .train(&mut table, Pos::new(0, 0), &mut rng)
            .unwrap();
        assert_eq!(report.episodes_completed(), 5);
        assert!(report.episodes.iter().all(|stats| stats.ending.is_some()));
    }

    #[test]
    fn test_step_limit_cuts_episodes() {
        let env = small_env();
        let mut table = ValueTable::for_env(&env);
        let mut rng = StdRng::seed_from_u64(8);
        let limited = TrainingConfig {
            episodes: 50,
            max_steps_per_episode: Some(1),
            ..TrainingConfig::default()
        };
        let report = train(&env, &mut table, Pos::new(2, 0), &limited, &mut rng).unwrap();

        for stats in &report.episodes {
            assert_eq!(stats.steps, 1);
        }
    }

    #[test]
    fn test_terminal_start_runs_empty_episodes() {
        let env = small_env();
        let mut table = ValueTable::for_env(&env);
        let mut rng = StdRng::seed_from_u64(2);
        let report = train(&env, &mut table, Pos::new(1, 1), &config(3), &mut rng).unwrap();

        assert_eq!(report.episodes_completed(), 3);
        for stats in &report.episodes {
            assert_eq!(stats.steps, 0);
            assert_eq!(stats.ending, Some(Terminal::Wall));
        }
        assert_eq!(table, ValueTable::for_env(&env));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let env = small_env();
        let bad = [
            TrainingConfig { epsilon: 1.2, ..TrainingConfig::default() },
            TrainingConfig { discount_factor: 1.0, ..TrainingConfig::default() },
            TrainingConfig { discount_factor: -0.1, ..TrainingConfig::default() },
            TrainingConfig { learning_rate: 0.0, ..TrainingConfig::default() },
            TrainingConfig { learning_rate: 1.5, ..TrainingConfig::default() },
            TrainingConfig { max_steps_per_episode: Some(0), ..TrainingConfig::default() },
        ];
        for config in bad.iter() {
            assert!(
                matches!(Trainer::new(&env, *config), Err(Error::InvalidConfiguration { .. })),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_out_of_bounds_start_rejected() {
        let env = small_env();
        let mut table = ValueTable::for_env(&env);
        let mut rng = StdRng::seed_from_u64(0);
        let result = train(&env, &mut table, Pos::new(0, 3), &config(1), &mut rng);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_mismatched_table_rejected() {
        let env = small_env();
        let mut table = ValueTable::new(2, 3);
        let mut rng = StdRng::seed_from_u64(0);
        let result = train(&env, &mut table, Pos::new(2, 0), &config(1), &mut rng);
        assert!(matches!(result, Err(Error::TableShapeMismatch { .. })));
    }
}
