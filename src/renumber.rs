use crate::dataset::Dataset;
use crate::error::UsageError;

/// Reassign `number` to 1..N in current order and `id` to `<prefix>_qNNN`.
pub fn renumber(dataset: &mut Dataset, prefix: &str) -> Result<(), UsageError> {
    if prefix.is_empty() {
        return Err(UsageError::EmptyPrefix);
    }

    for (i, question) in dataset.questions.iter_mut().enumerate() {
        let number = i as u32 + 1;
        question.number = number;
        question.id = format!("{}_q{:03}", prefix, number);
    }
    dataset.refresh_total();
    Ok(())
}
