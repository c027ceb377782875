use serde::{Deserialize, Serialize};

use crate::ids::Id;

/// A person from the reference entity list. People are referenced from
/// flights as pilot, copilot or towpilot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub id: Id,
    pub last_name: String,
    pub first_name: String,
    pub club: String,
    /// Membership number with the regional association, free form.
    pub association_number: String,
    pub comments: String,
}

impl Person {
    pub fn new(id: Id) -> Self {
        Person {
            id,
            ..Person::default()
        }
    }

    /// "Last name, first name" as shown in lists.
    pub fn formatted_name(&self) -> String {
        match (self.last_name.is_empty(), self.first_name.is_empty()) {
            (false, false) => format!("{}, {}", self.last_name, self.first_name),
            (false, true) => self.last_name.clone(),
            (true, false) => self.first_name.clone(),
            (true, true) => "-".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_name() {
        let mut person = Person::new(Id::new(1));
        assert_eq!(person.formatted_name(), "-");

        person.last_name = "Mustermann".to_string();
        assert_eq!(person.formatted_name(), "Mustermann");

        person.first_name = "Max".to_string();
        assert_eq!(person.formatted_name(), "Mustermann, Max");
    }
}
