//! draw_lots - one fortune slip per user and day, with an optional reroll

use chrono::NaiveDate;

use super::trait_def::{stable_hash, Plugin};
use crate::domain::entities::{Command, PluginDescriptor};

const SIGNS: &[&str] = &[
    "Great blessing: what you wait for arrives early.",
    "Blessing: a small kindness comes back to you.",
    "Middle blessing: steady steps, steady gains.",
    "Small blessing: mind the details today.",
    "Uncertain: ask twice before you act.",
    "Curse: keep your wallet close.",
];

/// Percent chance of drawing an empty slip
const BLANK_CHANCE: u64 = 5;

pub struct DrawLotsPlugin;

impl DrawLotsPlugin {
    /// Today's slip for a user, `None` for an empty slip
    pub fn draw(user_id: &str, day: NaiveDate) -> Option<&'static str> {
        Self::pick(stable_hash(&format!("draw:{}:{}", user_id, day)))
    }

    fn pick(roll: u64) -> Option<&'static str> {
        if roll % 100 < BLANK_CHANCE {
            return None;
        }
        Some(SIGNS[((roll / 100) % SIGNS.len() as u64) as usize])
    }

    fn render(slip: Option<&str>) -> String {
        match slip {
            Some(sign) => format!("Your slip:\n{}", sign),
            None => "An empty slip. Nothing is written on it.".to_string(),
        }
    }
}

impl Plugin for DrawLotsPlugin {
    fn name(&self) -> &str {
        "draw_lots"
    }

    fn description(&self) -> &str {
        "Draw a fortune slip"
    }

    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(self.name())
            .with_display_name("抽签")
            .with_feature("reroll")
    }

    fn commands(&self) -> Vec<Command> {
        vec![
            Command::new("draw")
                .with_alias("抽签")
                .with_description("Draw today's fortune slip")
                .for_plugin("draw_lots")
                .with_handler(|msg| {
                    let slip = DrawLotsPlugin::draw(msg.sender_id(), msg.timestamp.date_naive());
                    Ok(DrawLotsPlugin::render(slip))
                }),
            Command::new("reroll")
                .with_alias("重新抽签")
                .with_description("Draw a fresh slip, ignoring today's")
                .for_feature("draw_lots", "reroll")
                .with_handler(|_msg| {
                    let id = uuid::Uuid::new_v4();
                    let roll = u64::from_le_bytes(id.as_bytes()[..8].try_into().unwrap_or([0; 8]));
                    Ok(DrawLotsPlugin::render(DrawLotsPlugin::pick(roll)))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_is_stable_per_day() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(DrawLotsPlugin::draw("10001", day), DrawLotsPlugin::draw("10001", day));
    }

    #[test]
    fn test_pick() {
        assert_eq!(DrawLotsPlugin::pick(3), None);
        assert_eq!(DrawLotsPlugin::pick(50), Some(SIGNS[0]));
        assert_eq!(DrawLotsPlugin::pick(150), Some(SIGNS[1]));
    }

    #[test]
    fn test_commands_are_tagged() {
        let commands = DrawLotsPlugin.commands();
        assert_eq!(commands[0].plugin.as_deref(), Some("draw_lots"));
        assert_eq!(commands[1].feature.as_deref(), Some("reroll"));
        assert!(DrawLotsPlugin.descriptor().has_feature("reroll"));
    }
}
