use crate::environment::{Env, Movement, Pos, Terminal};

/// A walker moving through an [`Env`], accumulating the rewards of the cells
/// it steps onto.
#[derive(Debug, Clone)]
pub struct Agent {
    pub pos: Pos,
    pub reward: i64,
    pub steps: usize,
}

impl Agent {
    pub fn new(start: Pos) -> Self {
        Self {
            pos: start,
            reward: 0,
            steps: 0,
        }
    }

    /// Applies `movement` and returns the reward of the cell landed on,
    /// together with its terminal kind if the walk has to stop there.
    pub fn r#move(&mut self, env: &Env, movement: Movement) -> (i32, Option<Terminal>) {
        let new_pos = env.step(self.pos, movement);
        let reward = env.reward(new_pos);
        self.reward += i64::from(reward);
        self.steps += 1;
        self.pos = new_pos;

        (reward, env.terminal(new_pos))
    }
}
