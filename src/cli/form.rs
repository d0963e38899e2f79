use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use patientdb::registry::{BloodGroup, Gender, Patient, PatientForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    DateOfBirth,
    Gender,
    Contact,
    BloodGroup,
    Description,
    Submit,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Self::Name,
        Self::DateOfBirth,
        Self::Gender,
        Self::Contact,
        Self::BloodGroup,
        Self::Description,
        Self::Submit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name *",
            Self::DateOfBirth => "Date of birth",
            Self::Gender => "Gender *",
            Self::Contact => "Contact *",
            Self::BloodGroup => "Blood group",
            Self::Description => "Notes / allergies",
            Self::Submit => "Register patient",
        }
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(0)
    }

    fn next(&self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    fn prev(&self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Outcome of a key press on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormCommand {
    None,
    Submit,
}

/// Registration form with keyboard focus.
#[derive(Debug)]
pub struct FormState {
    pub form: PatientForm,
    pub focus: Field,
}

impl FormState {
    pub fn new() -> Self {
        Self {
            form: PatientForm::default(),
            focus: Field::Name,
        }
    }

    /// Replaces the contents with a stored patient and moves to the first field.
    pub fn load(&mut self, patient: &Patient) {
        self.form = PatientForm::from_patient(patient);
        self.focus = Field::Name;
    }

    /// Current text of a field as the form shows it.
    pub fn display(&self, field: Field) -> String {
        match field {
            Field::Name => self.form.name.clone(),
            Field::DateOfBirth => self.form.date_of_birth.clone(),
            Field::Gender => self.form.gender.map(|g| g.label().to_string()).unwrap_or_default(),
            Field::Contact => self.form.contact.clone(),
            Field::BloodGroup => self.form.blood_group.map(|b| b.to_string()).unwrap_or_default(),
            Field::Description => self.form.description.clone(),
            Field::Submit => String::new(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormCommand {
        let focus = self.focus;
        match key.code {
            KeyCode::Enter => return FormCommand::Submit,
            KeyCode::Tab | KeyCode::Down => self.focus = focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.focus = focus.prev(),
            KeyCode::Left | KeyCode::Right => {
                let forward = key.code == KeyCode::Right;
                match focus {
                    Field::Gender => self.form.gender = cycle(self.form.gender, &Gender::ALL, forward),
                    Field::BloodGroup => {
                        self.form.blood_group = cycle(self.form.blood_group, &BloodGroup::ALL, forward)
                    }
                    _ => {}
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = self.text_mut(focus) {
                    text.pop();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let accepted = match focus {
                    Field::DateOfBirth => c.is_ascii_digit() || c == '-' || c == '/',
                    _ => true,
                };
                if let (true, Some(text)) = (accepted, self.text_mut(focus)) {
                    text.push(c);
                }
            }
            _ => {}
        }
        FormCommand::None
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Name => Some(&mut self.form.name),
            Field::DateOfBirth => Some(&mut self.form.date_of_birth),
            Field::Contact => Some(&mut self.form.contact),
            Field::Description => Some(&mut self.form.description),
            _ => None,
        }
    }
}

/// Steps through `None` followed by every option.
fn cycle<T: Copy + PartialEq>(current: Option<T>, options: &[T], forward: bool) -> Option<T> {
    let len = options.len() + 1;
    let index = current
        .and_then(|c| options.iter().position(|o| *o == c))
        .map_or(0, |i| i + 1);
    let next = if forward { (index + 1) % len } else { (index + len - 1) % len };
    if next == 0 { None } else { Some(options[next - 1]) }
}
