use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const MATERIALS: &[&str] = &[
    "Basalt", "Bronze", "Clay", "Diamond", "Emerald", "Granite", "Jade", "Marble", "Obsidian",
    "Quartzite", "Serpentine", "Cedar", "Mahogany", "Maple", "Oak", "Pine", "Teak", "Holographic",
    "Polyester", "Origami",
];

const CREATURES: &[&str] = &[
    "Dracaenae", "Gargouille", "Gendenwitha", "HuayChivo", "Kubikajiri", "Laestrygonian",
    "Manananggal", "Namahage", "OrcoMamman", "Penanggalan", "Qingniao", "Shinigami", "Soucouyant",
    "Unicorn", "Xiangliu", "Zombie", "Vampire", "Werewolf", "Cthulu", "Yeti",
];

const CONNECTORS: &[&str] = &[
    "Behind", "Harvesting", "Planting", "SurroundedBy", "Trampling", "Eating",
];

const VEGETATION: &[&str] = &[
    "Crabgrass", "PoisonOak", "Roses", "Shrubs", "Strawberries", "Sunflowers", "Trees", "Wheat",
    "Bamboo", "Amaranth", "Kelp", "PricklyPear",
];

const LISTS: [&[&str]; 4] = [MATERIALS, CREATURES, CONNECTORS, VEGETATION];

const SEED_BASE: u64 = 0xF00D1E5;

/// Deterministic batch keyword for a sequence number.
///
/// Sequence numbers are grouped by the length of the longest word list; each
/// group shuffles every list with its own fixed seed and takes one word per
/// list, so no two names within a group repeat.
pub fn random_batch_name(seq: u32) -> String {
    let group_size = LISTS.iter().map(|list| list.len()).max().unwrap_or(1) as u32;
    let group = seq / group_size;
    let position = seq % group_size;

    let mut rng = StdRng::seed_from_u64(SEED_BASE + u64::from(group));
    LISTS
        .iter()
        .map(|list| {
            let mut words = list.to_vec();
            words.shuffle(&mut rng);
            words[position as usize % words.len()]
        })
        .collect()
}
