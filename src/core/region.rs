//! French department code to administrative region.

/// Department prefix (first two characters of a postal code) to region.
/// `97` covers the overseas departments, `0` is the catch-all for other countries.
pub const DEPARTMENT_REGIONS: &[(&str, &str)] = &[
    ("01", "Auvergne-Rhône-Alpes"),
    ("02", "Hauts-de-France"),
    ("03", "Auvergne-Rhône-Alpes"),
    ("04", "Provence-Alpes-Côte dAzur"),
    ("05", "Provence-Alpes-Côte dAzur"),
    ("06", "Provence-Alpes-Côte dAzur"),
    ("07", "Auvergne-Rhône-Alpes"),
    ("08", "Grand Est"),
    ("09", "Occitanie"),
    ("10", "Grand Est"),
    ("11", "Occitanie"),
    ("12", "Occitanie"),
    ("13", "Provence-Alpes-Côte dAzur"),
    ("14", "Normandie"),
    ("15", "Auvergne-Rhône-Alpes"),
    ("16", "Nouvelle-Aquitaine"),
    ("17", "Nouvelle-Aquitaine"),
    ("18", "Centre-Val de Loire"),
    ("19", "Nouvelle-Aquitaine"),
    ("20", "Corse"),
    ("21", "Bourgogne-Franche-Comté"),
    ("22", "Bretagne"),
    ("23", "Nouvelle-Aquitaine"),
    ("24", "Nouvelle-Aquitaine"),
    ("25", "Bourgogne-Franche-Comté"),
    ("26", "Auvergne-Rhône-Alpes"),
    ("27", "Normandie"),
    ("28", "Centre-Val de Loire"),
    ("29", "Bretagne"),
    ("30", "Occitanie"),
    ("31", "Occitanie"),
    ("32", "Occitanie"),
    ("33", "Nouvelle-Aquitaine"),
    ("34", "Occitanie"),
    ("35", "Bretagne"),
    ("36", "Centre-Val de Loire"),
    ("37", "Centre-Val de Loire"),
    ("38", "Auvergne-Rhône-Alpes"),
    ("39", "Bourgogne-Franche-Comté"),
    ("40", "Nouvelle-Aquitaine"),
    ("41", "Centre-Val de Loire"),
    ("42", "Auvergne-Rhône-Alpes"),
    ("43", "Auvergne-Rhône-Alpes"),
    ("44", "Pays de la Loire"),
    ("45", "Centre-Val de Loire"),
    ("46", "Occitanie"),
    ("47", "Nouvelle-Aquitaine"),
    ("48", "Occitanie"),
    ("49", "Pays de la Loire"),
    ("50", "Normandie"),
    ("51", "Grand Est"),
    ("52", "Grand Est"),
    ("53", "Pays de la Loire"),
    ("54", "Grand Est"),
    ("55", "Grand Est"),
    ("56", "Bretagne"),
    ("57", "Grand Est"),
    ("58", "Bourgogne-Franche-Comté"),
    ("59", "Hauts-de-France"),
    ("60", "Hauts-de-France"),
    ("61", "Normandie"),
    ("62", "Hauts-de-France"),
    ("63", "Auvergne-Rhône-Alpes"),
    ("64", "Nouvelle-Aquitaine"),
    ("65", "Occitanie"),
    ("66", "Occitanie"),
    ("67", "Grand Est"),
    ("68", "Grand Est"),
    ("69", "Auvergne-Rhône-Alpes"),
    ("70", "Bourgogne-Franche-Comté"),
    ("71", "Bourgogne-Franche-Comté"),
    ("72", "Pays de la Loire"),
    ("73", "Auvergne-Rhône-Alpes"),
    ("74", "Auvergne-Rhône-Alpes"),
    ("75", "Île-de-France"),
    ("76", "Normandie"),
    ("77", "Île-de-France"),
    ("78", "Île-de-France"),
    ("79", "Nouvelle-Aquitaine"),
    ("80", "Hauts-de-France"),
    ("81", "Occitanie"),
    ("82", "Occitanie"),
    ("83", "Provence-Alpes-Côte dAzur"),
    ("84", "Provence-Alpes-Côte dAzur"),
    ("85", "Pays de la Loire"),
    ("86", "Nouvelle-Aquitaine"),
    ("87", "Nouvelle-Aquitaine"),
    ("88", "Grand Est"),
    ("89", "Bourgogne-Franche-Comté"),
    ("90", "Bourgogne-Franche-Comté"),
    ("91", "Île-de-France"),
    ("92", "Île-de-France"),
    ("93", "Île-de-France"),
    ("94", "Île-de-France"),
    ("95", "Île-de-France"),
    ("97", "Outre mer"),
    ("0", "Autres pays"),
];

/// Looks up a region by exact key. No normalization: `"7"` or `"075"` find nothing.
pub fn region_for(postal_prefix: &str) -> Option<&'static str> {
    DEPARTMENT_REGIONS
        .iter()
        .find(|(code, _)| *code == postal_prefix)
        .map(|(_, region)| *region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_department_has_a_region() {
        assert_eq!(DEPARTMENT_REGIONS.len(), 97);
        for (code, region) in DEPARTMENT_REGIONS {
            assert_eq!(region_for(code), Some(*region));
        }
    }

    #[test]
    fn test_known_regions() {
        assert_eq!(region_for("75"), Some("Île-de-France"));
        assert_eq!(region_for("01"), Some("Auvergne-Rhône-Alpes"));
        assert_eq!(region_for("29"), Some("Bretagne"));
        assert_eq!(region_for("97"), Some("Outre mer"));
        assert_eq!(region_for("0"), Some("Autres pays"));
    }

    #[test]
    fn test_unmapped_prefixes() {
        assert_eq!(region_for("1"), None);
        assert_eq!(region_for("96"), None);
        assert_eq!(region_for("2A"), None);
        assert_eq!(region_for("750"), None);
        assert_eq!(region_for(""), None);
    }
}
