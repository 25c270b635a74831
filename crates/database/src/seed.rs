//! Sample roster generation for local development.

use crate::entities::{Attendee, NewAttendee};
use crate::repos::AttendeeRepository;
use crate::types::DatabaseResult;
use rand::Rng;
use tracing::info;

pub const DEFAULT_SEED_COUNT: usize = 20;

pub const FIRST_NAMES: [&str; 20] = [
    "Ava", "Liam", "Noah", "Emma", "Oliver", "Mia", "Elijah", "Amelia", "Sophia", "James",
    "Lucas", "Isabella", "Mason", "Charlotte", "Ethan", "Harper", "Logan", "Evelyn", "Jackson",
    "Abigail",
];

pub const LAST_NAMES: [&str; 20] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin",
];

/// `lower(first)_lower(last)_<position>` where position is 1-based.
pub fn seed_nickname(first_name: &str, last_name: &str, position: usize) -> String {
    format!(
        "{}_{}_{}",
        first_name.to_lowercase(),
        last_name.to_lowercase(),
        position
    )
}

/// Random first/last pairs drawn from the fixed name lists.
pub fn generate_seed_rows<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<NewAttendee> {
    (0..count)
        .map(|index| {
            let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
            let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
            NewAttendee::new(first, last, Some(seed_nickname(first, last, index + 1)))
        })
        .collect()
}

/// Insert the rows one statement at a time, in order.
pub async fn seed_attendees(
    repository: &AttendeeRepository,
    rows: Vec<NewAttendee>,
) -> DatabaseResult<Vec<Attendee>> {
    let mut inserted = Vec::with_capacity(rows.len());
    for row in rows {
        inserted.push(repository.insert(&row).await?);
    }
    info!(count = inserted.len(), "seeded attendees");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_seed_nickname_format() {
        assert_eq!(seed_nickname("Ava", "Smith", 1), "ava_smith_1");
        assert_eq!(seed_nickname("Charlotte", "Rodriguez", 20), "charlotte_rodriguez_20");
    }

    #[test]
    fn test_generate_seed_rows_draws_from_name_lists() {
        let mut rng = StdRng::seed_from_u64(42);
        let rows = generate_seed_rows(&mut rng, DEFAULT_SEED_COUNT);

        assert_eq!(rows.len(), 20);
        for (index, row) in rows.iter().enumerate() {
            assert!(FIRST_NAMES.contains(&row.first_name.as_str()));
            assert!(LAST_NAMES.contains(&row.last_name.as_str()));
            assert_eq!(
                row.nickname.as_deref(),
                Some(seed_nickname(&row.first_name, &row.last_name, index + 1).as_str())
            );
        }
    }

    #[test]
    fn test_generate_zero_rows() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_seed_rows(&mut rng, 0).is_empty());
    }
}
