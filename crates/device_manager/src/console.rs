use crate::prompt::SharedLines;
use anyhow::{anyhow, bail};
use common::domain::{DeviceStatus, DomainError, DomainResult, StatusTag};
use registry::{DeleteOutcome, DeviceRegistry, FormState, Workbench};
use std::io::{self, Write};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const HELP: &str = "\
commands:
  employees                list employees
  devices                  list devices
  employee new             open the employee form
  employee delete <id>     delete an employee
  device new               open the device form
  device edit <id>         open the device form for an existing device
  device delete <id>       delete a device
  set <field> <value>      set a field of the open form
  save                     save the open form
  cancel                   close the open form
  refresh                  reload everything from the store
  help                     show this text
  quit                     leave";

/// One line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Employees,
    Devices,
    EmployeeNew,
    EmployeeDelete(String),
    DeviceNew,
    DeviceEdit(String),
    DeviceDelete(String),
    Set { field: String, value: String },
    Save,
    Cancel,
    Refresh,
    Quit,
}

impl Command {
    /// Parse a command line. Blank lines parse to `None`.
    ///
    /// `set` takes the rest of the line as its value, so values may contain
    /// spaces and an absent value clears the field.
    pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (head, rest) = split_word(line);
        let command = match head {
            "help" | "?" => Command::Help,
            "employees" => Command::Employees,
            "devices" => Command::Devices,
            "save" => Command::Save,
            "cancel" => Command::Cancel,
            "refresh" => Command::Refresh,
            "quit" | "exit" => Command::Quit,
            "set" => {
                let (field, value) = split_word(rest);
                if field.is_empty() {
                    bail!("usage: set <field> <value>");
                }
                Command::Set {
                    field: field.to_string(),
                    value: value.to_string(),
                }
            }
            "employee" => match split_word(rest) {
                ("new", "") => Command::EmployeeNew,
                ("delete", id) if is_single_word(id) => Command::EmployeeDelete(id.to_string()),
                _ => bail!("usage: employee new | employee delete <id>"),
            },
            "device" => match split_word(rest) {
                ("new", "") => Command::DeviceNew,
                ("edit", id) if is_single_word(id) => Command::DeviceEdit(id.to_string()),
                ("delete", id) if is_single_word(id) => Command::DeviceDelete(id.to_string()),
                _ => bail!("usage: device new | device edit <id> | device delete <id>"),
            },
            other => return Err(anyhow!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

fn is_single_word(text: &str) -> bool {
    !text.is_empty() && !text.contains(char::is_whitespace)
}

fn tag_label(tag: StatusTag) -> &'static str {
    match tag {
        StatusTag::Success => "success",
        StatusTag::Info => "info",
        StatusTag::Warning => "warning",
        StatusTag::Neutral => "neutral",
    }
}

/// Which registry's form `set`, `save` and `cancel` act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveForm {
    None,
    Employee,
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line-oriented operator console over a [`Workbench`].
///
/// Store and validation failures are printed and otherwise absorbed; only
/// failures to write output or read input end the session.
pub struct Console<W> {
    workbench: Workbench,
    active: ActiveForm,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(workbench: Workbench, out: W) -> Self {
        Self {
            workbench,
            active: ActiveForm::None,
            out,
        }
    }

    pub fn workbench(&self) -> &Workbench {
        &self.workbench
    }

    /// Read and execute commands until `quit`, end of input or shutdown
    pub async fn run<R>(
        &mut self,
        input: SharedLines<R>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        writeln!(self.out, "{}", HELP)?;
        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;

            let line = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("console interrupted");
                    break;
                }
                line = async { input.lock().await.next_line().await } => line?,
            };

            let Some(line) = line else {
                debug!("end of operator input");
                break;
            };
            let flow = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("command interrupted");
                    break;
                }
                flow = self.execute_line(&line) => flow?,
            };
            if flow == Flow::Quit {
                break;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub async fn execute_line(&mut self, line: &str) -> io::Result<Flow> {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Ok(Flow::Continue),
            Err(e) => {
                writeln!(self.out, "{}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn execute(&mut self, command: Command) -> io::Result<Flow> {
        match command {
            Command::Help => writeln!(self.out, "{}", HELP)?,
            Command::Employees => self.list_employees()?,
            Command::Devices => self.list_devices()?,
            Command::EmployeeNew => {
                self.switch_form(ActiveForm::Employee)?;
                self.workbench.employees.open_create_form();
                self.show_form()?;
            }
            Command::EmployeeDelete(id) => {
                let result = self.workbench.employees.delete(&id).await;
                if let Some(outcome) = self.report(result)? {
                    self.report_delete("employee", outcome)?;
                    if outcome == DeleteOutcome::Deleted {
                        self.workbench.sync().await;
                    }
                }
            }
            Command::DeviceNew => {
                self.switch_form(ActiveForm::Device)?;
                self.workbench.devices.open_create_form();
                self.show_form()?;
            }
            Command::DeviceEdit(id) => {
                let result = self.workbench.devices.open_edit_form(&id);
                if self.report(result)?.is_some() {
                    self.switch_form(ActiveForm::Device)?;
                    self.show_form()?;
                }
            }
            Command::DeviceDelete(id) => {
                let result = self.workbench.devices.delete(&id).await;
                if let Some(outcome) = self.report(result)? {
                    self.report_delete("device", outcome)?;
                }
            }
            Command::Set { field, value } => {
                let result = self.set_field(&field, &value);
                if self.report(result)?.is_some() {
                    self.show_form()?;
                }
            }
            Command::Save => self.save().await?,
            Command::Cancel => {
                match self.active {
                    ActiveForm::Employee => self.workbench.employees.cancel_form(),
                    ActiveForm::Device => self.workbench.devices.cancel_form(),
                    ActiveForm::None => {}
                }
                self.active = ActiveForm::None;
                writeln!(self.out, "form closed")?;
            }
            Command::Refresh => {
                let result = self.workbench.employees.load().await;
                self.report(result)?;
                self.workbench.devices.refresh().await;
                writeln!(
                    self.out,
                    "{} employees, {} devices",
                    self.workbench.employees.employees().len(),
                    self.workbench.devices.devices().len()
                )?;
            }
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Make `next` the active form. At most one form is open across both
    /// registries, so an open draft in the other registry is discarded.
    fn switch_form(&mut self, next: ActiveForm) -> io::Result<()> {
        let discarded = match self.active {
            current if current == next => None,
            ActiveForm::Employee if self.workbench.employees.form().is_open() => {
                self.workbench.employees.cancel_form();
                Some("employee")
            }
            ActiveForm::Device if self.workbench.devices.form().is_open() => {
                self.workbench.devices.cancel_form();
                Some("device")
            }
            _ => None,
        };
        if let Some(kind) = discarded {
            writeln!(self.out, "discarded open {} form", kind)?;
        }
        self.active = next;
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> DomainResult<()> {
        match self.active {
            ActiveForm::Employee => self
                .workbench
                .employees
                .draft_mut()
                .ok_or(DomainError::NoOpenForm)?
                .set_field(field, value),
            ActiveForm::Device => self
                .workbench
                .devices
                .draft_mut()
                .ok_or(DomainError::NoOpenForm)?
                .set_field(field, value),
            ActiveForm::None => Err(DomainError::NoOpenForm),
        }
    }

    async fn save(&mut self) -> io::Result<()> {
        match self.active {
            ActiveForm::Employee => {
                let result = self.workbench.employees.submit_form().await;
                if self.report(result)?.is_some() {
                    self.active = ActiveForm::None;
                    writeln!(self.out, "employee saved")?;
                    self.workbench.sync().await;
                    self.list_employees()?;
                }
            }
            ActiveForm::Device => {
                let result = self.workbench.devices.submit_form().await;
                if self.report(result)?.is_some() {
                    self.active = ActiveForm::None;
                    writeln!(self.out, "device saved")?;
                    self.list_devices()?;
                }
            }
            ActiveForm::None => {
                self.report::<()>(Err(DomainError::NoOpenForm))?;
            }
        }
        Ok(())
    }

    /// Print a failed operation; registry state is already unchanged
    fn report<T>(&mut self, result: DomainResult<T>) -> io::Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                writeln!(self.out, "error: {}", e)?;
                Ok(None)
            }
        }
    }

    fn report_delete(&mut self, kind: &str, outcome: DeleteOutcome) -> io::Result<()> {
        match outcome {
            DeleteOutcome::Deleted => writeln!(self.out, "{} deleted", kind),
            DeleteOutcome::Declined => writeln!(self.out, "delete cancelled"),
        }
    }

    fn list_employees(&mut self) -> io::Result<()> {
        let employees = self.workbench.employees.employees();
        if employees.is_empty() {
            return writeln!(self.out, "no employees");
        }
        for employee in employees {
            writeln!(
                self.out,
                "{}  {} <{}>  {}",
                employee.id, employee.name, employee.email, employee.department
            )?;
        }
        Ok(())
    }

    fn list_devices(&mut self) -> io::Result<()> {
        let registry = &self.workbench.devices;
        if registry.devices().is_empty() {
            return writeln!(self.out, "no devices");
        }
        for device in registry.devices() {
            let tag = DeviceRegistry::status_presentation_tag(&device.status);
            let assigned = device
                .assigned_date
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                self.out,
                "{}  {} ({}, serial {})  status: {} [{}]  assignee: {}  since: {}",
                device.id,
                device.device_name,
                device.device_type,
                device.serial_number,
                device.status,
                tag_label(tag),
                registry.resolve_employee_name(device.employee_id.as_deref()),
                assigned
            )?;
        }
        Ok(())
    }

    fn show_form(&mut self) -> io::Result<()> {
        match self.active {
            ActiveForm::Employee => {
                let Some(draft) = self.workbench.employees.form().draft() else {
                    return Ok(());
                };
                writeln!(self.out, "new employee")?;
                writeln!(self.out, "  name: {}", draft.name)?;
                writeln!(self.out, "  email: {}", draft.email)?;
                writeln!(self.out, "  department: {}", draft.department)?;
            }
            ActiveForm::Device => {
                let registry = &self.workbench.devices;
                let (title, draft) = match registry.form() {
                    FormState::Closed => return Ok(()),
                    FormState::Create { draft } => ("new device".to_string(), draft),
                    FormState::Edit { id, draft } => (format!("edit device {}", id), draft),
                };
                let assignee = registry.resolve_employee_name(Some(&draft.employee_id));

                writeln!(self.out, "{}", title)?;
                writeln!(self.out, "  device_name: {}", draft.device_name)?;
                writeln!(self.out, "  device_type: {}", draft.device_type)?;
                writeln!(self.out, "  serial_number: {}", draft.serial_number)?;
                writeln!(self.out, "  status: {}", draft.status)?;
                writeln!(self.out, "  employee_id: {} ({})", draft.employee_id, assignee)?;
                writeln!(self.out, "  notes: {}", draft.notes)?;

                let statuses: Vec<&str> = DeviceStatus::OFFERED.iter().map(|s| s.as_str()).collect();
                writeln!(self.out, "statuses: {}", statuses.join(", "))?;
                for employee in registry.employee_directory() {
                    writeln!(self.out, "employee {}  {}", employee.id, employee.name)?;
                }
            }
            ActiveForm::None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::memory::InMemoryRecordStore;
    use registry::AutoConfirm;
    use std::sync::Arc;
    use tokio::io::AsyncBufReadExt;
    use tokio::sync::Mutex;

    async fn console(confirm: AutoConfirm) -> Console<Vec<u8>> {
        let store = Arc::new(InMemoryRecordStore::new());
        let mut workbench = Workbench::new(store, Arc::new(confirm));
        workbench.start().await;
        Console::new(workbench, Vec::new())
    }

    fn output(console: &mut Console<Vec<u8>>) -> String {
        String::from_utf8(std::mem::take(&mut console.out)).unwrap()
    }

    async fn feed(console: &mut Console<Vec<u8>>, lines: &[&str]) {
        for line in lines {
            assert_eq!(console.execute_line(line).await.unwrap(), Flow::Continue);
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("devices").unwrap(), Some(Command::Devices));
        assert_eq!(
            Command::parse("employee delete emp-1").unwrap(),
            Some(Command::EmployeeDelete("emp-1".to_string()))
        );
        assert_eq!(
            Command::parse("device edit  dev-1 ").unwrap(),
            Some(Command::DeviceEdit("dev-1".to_string()))
        );
        assert_eq!(
            Command::parse("set notes cracked back glass").unwrap(),
            Some(Command::Set {
                field: "notes".to_string(),
                value: "cracked back glass".to_string()
            })
        );
        assert_eq!(
            Command::parse("set employee").unwrap(),
            Some(Command::Set {
                field: "employee".to_string(),
                value: String::new()
            })
        );
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_parse_rejects_malformed_commands() {
        assert!(Command::parse("set").is_err());
        assert!(Command::parse("employee edit emp-1").is_err());
        assert!(Command::parse("device delete").is_err());
        assert!(Command::parse("device delete a b").is_err());
        assert!(Command::parse("launch").is_err());
    }

    #[tokio::test]
    async fn test_employee_form_round_trip() {
        let mut console = console(AutoConfirm::yes()).await;
        feed(
            &mut console,
            &[
                "employee new",
                "set name Ann",
                "set email ann@x.com",
                "set department QA",
                "save",
            ],
        )
        .await;

        let out = output(&mut console);
        assert!(out.contains("employee saved"));
        assert!(out.contains("Ann <ann@x.com>  QA"));
        assert_eq!(console.workbench().employees.employees().len(), 1);
        // the save propagated to the device registry
        assert_eq!(console.workbench().devices.refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_save_keeps_form_open() {
        let mut console = console(AutoConfirm::yes()).await;
        feed(&mut console, &["employee new", "set name Ann", "save"]).await;

        let out = output(&mut console);
        assert!(out.contains("error: Validation error"));
        assert!(console.workbench().employees.form().is_open());

        feed(&mut console, &["set email ann@x.com", "save"]).await;
        assert!(output(&mut console).contains("employee saved"));
    }

    #[tokio::test]
    async fn test_device_listing_resolves_assignee_and_tag() {
        let mut console = console(AutoConfirm::yes()).await;
        feed(
            &mut console,
            &[
                "employee new",
                "set name Ann",
                "set email ann@x.com",
                "save",
            ],
        )
        .await;
        let ann_id = console.workbench().employees.employees()[0].id.clone();

        feed(
            &mut console,
            &[
                "device new",
                "set name iPhone 12",
                "set type Phone",
                "set serial SN1",
                "set status Assigned",
                &format!("set employee {}", ann_id),
                "save",
            ],
        )
        .await;

        let out = output(&mut console);
        assert!(out.contains("device saved"));
        assert!(out.contains("status: Assigned [info]  assignee: Ann"));

        let device_id = console.workbench().devices.devices()[0].id.clone();
        feed(&mut console, &[&format!("employee delete {}", ann_id), "devices"]).await;
        let out = output(&mut console);
        assert!(out.contains("employee deleted"));
        assert!(out.contains(&device_id));
        assert!(out.contains("assignee: Unknown"));
    }

    #[tokio::test]
    async fn test_set_without_open_form_reports_error() {
        let mut console = console(AutoConfirm::yes()).await;
        feed(&mut console, &["set name Ann", "save", "device edit dev-404"]).await;

        let out = output(&mut console);
        assert_eq!(out.matches("error: No form is open").count(), 2);
        assert!(out.contains("error: Device not found: dev-404"));
    }

    #[tokio::test]
    async fn test_declined_delete_is_reported() {
        let mut console = console(AutoConfirm::no()).await;
        feed(
            &mut console,
            &[
                "device new",
                "set name Pixel",
                "set type Phone",
                "set serial SN2",
                "save",
            ],
        )
        .await;
        let id = console.workbench().devices.devices()[0].id.clone();
        output(&mut console);

        feed(&mut console, &[&format!("device delete {}", id)]).await;
        assert!(output(&mut console).contains("delete cancelled"));
        assert_eq!(console.workbench().devices.devices().len(), 1);
    }

    #[tokio::test]
    async fn test_opening_another_form_discards_previous_draft() {
        let mut console = console(AutoConfirm::yes()).await;
        feed(
            &mut console,
            &["employee new", "set name Ann", "set email ann@x.com", "device new"],
        )
        .await;

        assert!(output(&mut console).contains("discarded open employee form"));
        assert!(!console.workbench().employees.form().is_open());
        assert!(console.workbench().devices.form().is_open());

        feed(&mut console, &["cancel", "save"]).await;
        assert!(output(&mut console).contains("error: No form is open"));
        assert!(!console.workbench().devices.form().is_open());
        assert!(console.workbench().employees.employees().is_empty());
    }

    #[tokio::test]
    async fn test_failed_edit_keeps_active_form() {
        let mut console = console(AutoConfirm::yes()).await;
        feed(&mut console, &["employee new", "device edit dev-404", "set name Ann"]).await;

        let out = output(&mut console);
        assert!(!out.contains("discarded"));
        assert!(console.workbench().employees.form().is_open());
        assert_eq!(
            console.workbench().employees.form().draft().map(|d| d.name.as_str()),
            Some("Ann")
        );
    }

    #[tokio::test]
    async fn test_run_stops_at_quit() {
        let mut console = console(AutoConfirm::yes()).await;
        let input = Arc::new(Mutex::new(b"devices\nquit\nemployees\n".as_slice().lines()));

        console.run(input, CancellationToken::new()).await.unwrap();

        let out = output(&mut console);
        assert!(out.contains("no devices"));
        assert!(!out.contains("no employees"));
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let mut console = console(AutoConfirm::yes()).await;
        let input = Arc::new(Mutex::new(b"devices\n".as_slice().lines()));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        console.run(input, shutdown).await.unwrap();
        assert!(!output(&mut console).contains("no devices"));
    }
}
