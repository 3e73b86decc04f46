//! Save state record
//!
//! Serialized as the JSON save format used by existing save slots:
//!
//! ```json
//! { "wasmboyMemory": {
//!     "wasmBoyInternalState": [..],
//!     "wasmBoyPaletteMemory": [..],
//!     "gameBoyMemory": [..],
//!     "cartridgeRam": [..] } }
//! ```

use serde::{Deserialize, Serialize};

/// Complete state of one core instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    #[serde(rename = "wasmboyMemory")]
    pub memory: SaveStateMemory,

    /// Frame buffer contents at capture time.
    ///
    /// The frame buffer lives outside the core's state regions, so it is kept
    /// alongside in-process snapshots to make a restored session show the same
    /// picture. Never persisted.
    #[serde(skip)]
    pub framebuffer: Option<Vec<u8>>,
}

/// The four memory regions that make up a save state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStateMemory {
    pub cartridge_ram: Vec<u8>,
    pub game_boy_memory: Vec<u8>,
    #[serde(rename = "wasmBoyPaletteMemory")]
    pub palette_memory: Vec<u8>,
    #[serde(rename = "wasmBoyInternalState")]
    pub internal_state: Vec<u8>,
}

impl SaveState {
    /// Total size of the persisted regions in bytes
    pub fn len(&self) -> usize {
        let m = &self.memory;
        m.cartridge_ram.len() + m.game_boy_memory.len() + m.palette_memory.len() + m.internal_state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_save_slot_field_names() {
        let state = SaveState {
            memory: SaveStateMemory {
                cartridge_ram: vec![1],
                game_boy_memory: vec![2, 3],
                palette_memory: vec![4],
                internal_state: vec![5],
            },
            framebuffer: Some(vec![9; 3]),
        };

        let json = serde_json::to_value(&state).unwrap();
        let memory = &json["wasmboyMemory"];
        assert_eq!(memory["cartridgeRam"], serde_json::json!([1]));
        assert_eq!(memory["gameBoyMemory"], serde_json::json!([2, 3]));
        assert_eq!(memory["wasmBoyPaletteMemory"], serde_json::json!([4]));
        assert_eq!(memory["wasmBoyInternalState"], serde_json::json!([5]));
        assert!(json.get("framebuffer").is_none());
    }

    #[test]
    fn deserialized_state_has_no_framebuffer() {
        let json = r#"{"wasmboyMemory":{"cartridgeRam":[],"gameBoyMemory":[7],
            "wasmBoyPaletteMemory":[],"wasmBoyInternalState":[8,9]}}"#;
        let state: SaveState = serde_json::from_str(json).unwrap();
        assert_eq!(state.memory.game_boy_memory, vec![7]);
        assert_eq!(state.len(), 3);
        assert!(state.framebuffer.is_none());
    }
}
