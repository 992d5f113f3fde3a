/// Index of the largest value; the first one wins a tie. NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Winning class and its probability as a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub index: usize,
    pub confidence: f32,
}

pub fn decide(probabilities: &[f32]) -> Option<Decision> {
    let index = argmax(probabilities)?;
    Some(Decision {
        index,
        confidence: probabilities[index] * 100.0,
    })
}
