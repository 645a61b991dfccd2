//! Shape-counting questions: "how many triangles are in this row?"

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

pub const SEQUENCE_LEN: usize = 9;
pub const MAX_TARGET_COUNT: usize = 5;
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
}

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::Circle, Shape::Square, Shape::Triangle];

    fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub shape: Shape,
    pub sequence: Vec<Shape>,
    pub options: Vec<usize>,
}

impl Question {
    /// Leads with `1..=5` copies of the target, then random filler. The filler may
    /// repeat the target, so the answer is counted over the whole row.
    pub fn generate(rng: &mut impl Rng) -> Self {
        let shape = Shape::random(rng);
        let leading = rng.gen_range(1..=MAX_TARGET_COUNT);

        let mut sequence = vec![shape; leading];
        sequence.extend((leading..SEQUENCE_LEN).map(|_| Shape::random(rng)));

        let correct = count_of(shape, &sequence);
        let mut options: Vec<usize> = (0..OPTION_COUNT).map(|offset| correct + offset).collect();
        options.shuffle(rng);

        Self {
            shape,
            sequence,
            options,
        }
    }

    pub fn correct_answer(&self) -> usize {
        count_of(self.shape, &self.sequence)
    }

    pub fn is_correct(&self, answer: usize) -> bool {
        answer == self.correct_answer()
    }
}

fn count_of(shape: Shape, sequence: &[Shape]) -> usize {
    sequence.iter().filter(|s| **s == shape).count()
}

pub fn generate_round(rng: &mut impl Rng, count: usize) -> Vec<Question> {
    (0..count).map(|_| Question::generate(rng)).collect()
}
