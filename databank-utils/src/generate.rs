//! Deterministic sample data
use databank::{Bank, NodeId, NodeOptions};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use tracing::info;

const TEAMS: &[&str] = &["engineering", "sales", "support", "research"];
const NAMES: &[&str] = &[
    "ada", "grace", "alan", "barbara", "edsger", "donald", "frances", "ken", "dennis", "margaret",
];

/// Build `teams` team records, each with a number of member records.
///
/// Members get a `name`, an `age` (u32), a `score` (f64) and sometimes an `active` flag or an
/// `avatar` blob. The same seed always produces the same bank.
pub fn build(bank: &Bank, seed: u64, teams: usize, members: usize) -> anyhow::Result<Vec<NodeId>> {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    let mut res = Vec::with_capacity(teams);
    for i in 0..teams {
        let name = TEAMS[i % TEAMS.len()];
        let team = bank.add_record(
            bank.root(),
            "team",
            Some(&NodeOptions::display(format!("{} {}", name, i))),
        )?;
        bank.set_data_point(team, "name", name, None)?;
        for _ in 0..rng.gen_range(0..=members) {
            add_member(bank, team, &mut rng)?;
        }
        res.push(team);
    }
    info!(
        "built {} teams with {} records in total",
        teams,
        bank.record_count()
    );
    Ok(res)
}

fn add_member(bank: &Bank, team: NodeId, rng: &mut impl Rng) -> anyhow::Result<NodeId> {
    let member = bank.add_record(team, "member", None)?;
    let name = NAMES.choose(rng).copied().unwrap_or("anonymous");
    bank.set_data_point(member, "name", name, None)?;
    bank.set_data_point(member, "age", rng.gen_range(16u32..70), None)?;
    bank.set_data_point(member, "score", rng.gen_range(0.0..100.0f64), None)?;
    if rng.gen_bool(0.3) {
        bank.set_data_point(member, "active", true, None)?;
    }
    if rng.gen_bool(0.1) {
        let avatar: Vec<u8> = (0..8).map(|_| rng.gen()).collect();
        bank.set_data_point(member, "avatar", avatar, None)?;
    }
    Ok(member)
}
