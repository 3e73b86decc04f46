//! Global palette construction
//!
//! Game Boy output uses very few distinct colours, so a frequency histogram
//! over every frame usually covers the whole picture exactly. When it does
//! not, the most frequent colours win and the rest map to their nearest
//! palette entry.

use hashbrown::HashMap;

type Rgb = [u8; 3];

/// An indexed colour table shared by every frame of an animation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
    lookup: HashMap<Rgb, u8>,
}

impl Palette {
    /// Build a palette of at most `max_colors` entries from RGBA8 frames
    pub fn build<'a>(frames: impl IntoIterator<Item = &'a [u8]>, max_colors: usize) -> Self {
        let max_colors = max_colors.clamp(1, 256);

        let mut histogram: HashMap<Rgb, u64> = HashMap::new();
        for frame in frames {
            for pixel in frame.chunks_exact(4) {
                *histogram.entry([pixel[0], pixel[1], pixel[2]]).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(Rgb, u64)> = histogram.into_iter().collect();
        // Most frequent first; colour value breaks ties so output is stable
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(max_colors);

        let mut colors: Vec<Rgb> = ranked.into_iter().map(|(color, _)| color).collect();
        if colors.is_empty() {
            colors.push([0, 0, 0]);
        }
        let lookup = colors
            .iter()
            .enumerate()
            .map(|(i, color)| (*color, i as u8))
            .collect();

        Self { colors, lookup }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Flat RGB colour table as the GIF encoder expects it
    pub fn to_rgb_table(&self) -> Vec<u8> {
        self.colors.iter().flatten().copied().collect()
    }

    /// Map an RGBA8 frame to palette indices.
    ///
    /// Colours missing from the palette resolve to the nearest entry and are
    /// remembered for later frames.
    pub fn index_frame(&mut self, rgba: &[u8]) -> Vec<u8> {
        rgba.chunks_exact(4)
            .map(|pixel| self.index_of([pixel[0], pixel[1], pixel[2]]))
            .collect()
    }

    fn index_of(&mut self, color: Rgb) -> u8 {
        if let Some(&index) = self.lookup.get(&color) {
            return index;
        }
        let index = self.nearest(color);
        self.lookup.insert(color, index);
        index
    }

    fn nearest(&self, color: Rgb) -> u8 {
        let distance = |other: &Rgb| -> u32 {
            color
                .iter()
                .zip(other)
                .map(|(&a, &b)| (a as i32 - b as i32).pow(2) as u32)
                .sum()
        };
        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(_, other)| distance(other))
            .map(|(i, _)| i as u8)
            .unwrap_or(0)
    }
}
