use super::execute::DriversResult;
use crate::output::Outputable;

impl Outputable for DriversResult {
    fn to_table(&self) -> String {
        if self.drivers.is_empty() {
            return "No drivers registered.".to_string();
        }
        let mut lines = vec![format!("Drivers ({}):", self.drivers.len())];
        lines.extend(self.drivers.iter().map(|d| format!("  {}", d)));
        lines.join("\n")
    }
}
