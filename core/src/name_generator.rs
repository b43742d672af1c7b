//! Deterministic display names and locality labels.
//!
//! Group names depend only on the group index, so the same group keeps
//! its name across runs regardless of seed. Localities and member names
//! come from the group's own RNG stream.

use crate::rng::GroupRng;

/// Deterministic name generator using curated word lists.
pub struct NameGenerator;

impl NameGenerator {
    /// `"<PREFIX> <ADJECTIVE> <NOUN> <index>"`, upper-cased. `index` is 1-based.
    pub fn group_name(index: usize) -> String {
        let mut rng = GroupRng::from_seed(index as u64).with_name("group_name");
        let name = format!(
            "{} {} {} {index}",
            rng.choose(Self::prefixes()),
            rng.choose(Self::adjectives()),
            rng.choose(Self::nouns()),
        );
        name.to_uppercase()
    }

    pub fn city(rng: &mut GroupRng) -> &'static str {
        *rng.choose(Self::cities())
    }

    pub fn village(rng: &mut GroupRng) -> &'static str {
        *rng.choose(Self::villages())
    }

    pub fn member_name(rng: &mut GroupRng) -> String {
        format!("Ibu {}", rng.choose(Self::member_first_names()))
    }

    pub fn field_agent(rng: &mut GroupRng) -> String {
        format!("Agent {}", rng.choose(Self::agents()))
    }

    fn prefixes() -> &'static [&'static str] {
        &["Kelompok", "Paguyuban", "Koperasi", "Mitra"]
    }

    fn adjectives() -> &'static [&'static str] {
        &[
            "Maju", "Sejahtera", "Makmur", "Sentosa", "Barokah",
            "Sinar", "Harapan", "Cahaya", "Mandiri", "Bersama",
        ]
    }

    fn nouns() -> &'static [&'static str] {
        &[
            "Jaya", "Abadi", "Lestari", "Berkah", "Usaha",
            "Karya", "Bina", "Dana", "Sahabat", "Mitra",
        ]
    }

    /// Greater Jakarta service area.
    fn cities() -> &'static [&'static str] {
        &[
            "Jakarta Pusat", "Jakarta Utara", "Jakarta Selatan", "Jakarta Timur", "Jakarta Barat",
            "Bogor", "Depok", "Tangerang", "Bekasi", "Tangerang Selatan",
        ]
    }

    fn villages() -> &'static [&'static str] {
        &[
            "Desa Maju Jaya", "Desa Sejahtera", "Desa Makmur", "Desa Sentosa", "Desa Barokah",
            "Desa Sinar Harapan", "Desa Cahaya Baru", "Desa Mandiri", "Desa Bersama", "Desa Lestari",
            "Kelurahan Merdeka", "Kelurahan Bina Karya", "Kelurahan Sukamaju", "Kelurahan Harmoni",
            "Kampung Damai", "Kampung Rukun", "Kampung Gotong Royong", "Kampung Makmur Jaya",
        ]
    }

    fn member_first_names() -> &'static [&'static str] {
        &["Sri", "Budi", "Siti", "Agus", "Dewi", "Rina", "Joko", "Wati", "Endang", "Eko"]
    }

    fn agents() -> &'static [&'static str] {
        &["Budi", "Sari"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_name_is_deterministic_per_index() {
        assert_eq!(NameGenerator::group_name(7), NameGenerator::group_name(7));
        assert!(NameGenerator::group_name(7).ends_with(" 7"));
    }

    #[test]
    fn group_names_have_four_upper_case_parts() {
        for i in 1..=50 {
            let name = NameGenerator::group_name(i);
            let parts: Vec<&str> = name.split_whitespace().collect();
            assert_eq!(parts.len(), 4, "unexpected name shape: {name}");
            assert_eq!(name, name.to_uppercase());
        }
    }

    #[test]
    fn localities_come_from_the_lists() {
        let mut rng = GroupRng::from_seed(12345);
        for _ in 0..100 {
            assert!(NameGenerator::cities().contains(&NameGenerator::city(&mut rng)));
            assert!(NameGenerator::villages().contains(&NameGenerator::village(&mut rng)));
        }
    }
}
