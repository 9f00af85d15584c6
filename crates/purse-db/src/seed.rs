//! Demo data for fresh stores

use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;

use crate::models::NewUser;

/// Number of demo accounts created when seeding
pub const DEFAULT_SEED_COUNT: usize = 10;

/// One demo account: the user row, its plaintext password and opening balance
#[derive(Debug, Clone)]
pub struct SeedFixture {
    pub user: NewUser,
    pub password: String,
    pub balance: Decimal,
}

/// Build `count` random demo accounts.
///
/// Passwords are six lowercase letters and are hashed with `hasher`; balances
/// are two-decimal amounts in `[0, 1000)`. The first hashing error aborts.
pub fn demo_fixtures<F, E>(count: usize, mut hasher: F) -> Result<Vec<SeedFixture>, E>
where
    F: FnMut(&str) -> Result<String, E>,
{
    let mut rng = rand::thread_rng();
    let mut fixtures = Vec::with_capacity(count);

    for _ in 0..count {
        let name = random_lowercase(&mut rng, 6);
        let password = random_lowercase(&mut rng, 6);
        let email = format!("{}@email.com", random_lowercase(&mut rng, 6));
        let balance = Decimal::new(rng.gen_range(0..100_000), 2);

        fixtures.push(SeedFixture {
            user: NewUser {
                full_name: name,
                email,
                password_hash: hasher(&password)?,
            },
            password,
            balance,
        });
    }

    Ok(fixtures)
}

fn random_lowercase<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .take(len)
        .collect()
}
