//! Colored terminal rendering for planning-core types.

use owo_colors::OwoColorize;
use planning_core::Event;
use planning_core::controller::Branch;
use planning_core::ics::FeedSummary;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for Branch {
    fn render(&self) -> String {
        let groups: Vec<&str> = self.groups.iter().map(|g| g.name.as_str()).collect();
        format!(
            "{} {} {}",
            self.name.bold(),
            format!("({})", self.parser.mode()).dimmed(),
            groups.join(", ")
        )
    }
}

impl Render for FeedSummary {
    fn render(&self) -> String {
        let span = match (self.first_start, self.last_start) {
            (Some(first), Some(last)) => format!(
                "{} → {}",
                first.format("%Y-%m-%d %H:%M"),
                last.format("%Y-%m-%d %H:%M")
            ),
            _ => "no events".to_string(),
        };
        format!("{} events  {}", self.count.bold(), span.dimmed())
    }
}

impl Render for Event {
    fn render(&self) -> String {
        let mut line = format!(
            "{} {}",
            self.start_date.format("%Y-%m-%d %H:%M").dimmed(),
            self.title
        );
        if !self.classrooms.is_empty() {
            line.push_str(&format!("  @ {}", self.classrooms.join(", ")));
        }
        if !self.teachers.is_empty() {
            let teachers: Vec<&str> = self.teachers.iter().map(String::as_str).collect();
            line.push_str(&format!("  {}", teachers.join(", ").cyan()));
        }
        if !self.groups.is_empty() {
            let groups: Vec<&str> = self.groups.iter().map(String::as_str).collect();
            line.push_str(&format!("  [{}]", groups.join(", ")));
        }
        if !self.undetermined_description_items.is_empty() {
            line.push_str(&format!(
                "  {}",
                self.undetermined_description_items.join(" | ").yellow()
            ));
        }
        line
    }
}
