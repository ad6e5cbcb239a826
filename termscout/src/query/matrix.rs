/// Expands term axes into their cartesian product of `AND` queries.
///
/// The first axis varies slowest, so `[[GSTP1, HOXA9], [PCR, sequencing]]`
/// yields `GSTP1 AND PCR`, `GSTP1 AND sequencing`, `HOXA9 AND PCR`,
/// `HOXA9 AND sequencing`. Blank entries are dropped; an axis left empty
/// produces no queries at all.
pub fn expand_matrix(axes: &[Vec<String>]) -> Vec<String> {
    if axes.is_empty() {
        return Vec::new();
    }

    let mut combos: Vec<Vec<&str>> = vec![Vec::new()];
    for axis in axes {
        let entries: Vec<&str> = axis
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .collect();
        combos = combos
            .iter()
            .flat_map(|prefix| {
                entries.iter().map(move |entry| {
                    let mut combo = prefix.clone();
                    combo.push(*entry);
                    combo
                })
            })
            .collect();
    }

    combos.into_iter().map(|combo| combo.join(" AND ")).collect()
}
