//! jrrp - "today's luck", a number from 0 to 100 fixed per user and day

use chrono::NaiveDate;

use super::trait_def::{stable_hash, Plugin};
use crate::domain::entities::{Command, PluginDescriptor};

pub struct JrrpPlugin;

impl JrrpPlugin {
    pub fn luck(user_id: &str, day: NaiveDate) -> u8 {
        (stable_hash(&format!("jrrp:{}:{}", user_id, day)) % 101) as u8
    }

    fn comment(luck: u8) -> &'static str {
        match luck {
            0..=10 => "Maybe stay in bed today.",
            11..=40 => "Could be better.",
            41..=70 => "An ordinary day.",
            71..=90 => "Looking good!",
            _ => "Go buy a lottery ticket.",
        }
    }
}

impl Plugin for JrrpPlugin {
    fn name(&self) -> &str {
        "jrrp"
    }

    fn description(&self) -> &str {
        "Today's luck"
    }

    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(self.name()).with_display_name("今日人品")
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("jrrp")
            .with_alias("今日人品")
            .with_description("Show today's luck")
            .for_plugin("jrrp")
            .with_handler(|msg| {
                let name = msg.sender.as_ref().map(|u| u.display_name()).unwrap_or_else(|| msg.chat_id.clone());
                let luck = JrrpPlugin::luck(msg.sender_id(), msg.timestamp.date_naive());
                Ok(format!("{}'s luck today: {}/100. {}", name, luck, JrrpPlugin::comment(luck)))
            })]
    }
}
