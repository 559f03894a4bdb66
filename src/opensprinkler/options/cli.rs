use crate::{
    opensprinkler::{options::OptionIndex, store, Controller},
    utils,
};

pub fn list(controller: &Controller) {
    let options: Vec<_> = controller.options().iter().collect();
    match serde_json::to_string_pretty(&options) {
        Ok(json) => println!("{}", json),
        Err(error) => println!("Error: {}", error),
    }
}

/// Set and commit an option (`[json_name, value]`)
///
/// Returns the value stored after clamping.
pub fn set(option_set: Vec<String>, controller: &mut Controller) -> Result<u8, &'static str> {
    let (name, value) = match option_set.as_slice() {
        [name, value] => (name, value),
        _ => return Err("Expected an option name and a value"),
    };

    let index = OptionIndex::from_json_name(name).ok_or("Unknown option")?;
    if index.spec().flags.read_only {
        return Err("Option is read-only");
    }
    let value: u32 = value.parse().map_err(|_| "Could not parse value")?;

    let value = controller.set_option(index, value);
    controller.options_save().map_err(|_| "Could not save options")?;
    Ok(value)
}

pub fn reset(controller: &mut Controller) -> store::Result<()> {
    controller.factory_reset()?;
    println!("Reset controller to defaults");
    Ok(())
}

pub fn status(controller: &Controller) {
    match serde_json::to_string_pretty(&controller.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(error) => println!("Error: {}", error),
    }

    if let Some(remaining) = controller.state.rain.remaining(controller.now()) {
        println!("Rain delay: {} remaining", utils::duration_to_hms(remaining));
    }
}

#[cfg(test)]
mod tests {
    use crate::opensprinkler::{clock::ManualClock, gpio::Simulated, options::OptionIndex, store::MemoryStore, Controller};

    fn controller() -> Controller {
        let mut controller = Controller::new(MemoryStore::default(), Simulated::new(), ManualClock::new(0));
        controller.setup().unwrap();
        controller
    }

    fn args(name: &str, value: &str) -> Vec<String> {
        vec![name.to_string(), value.to_string()]
    }

    #[test]
    fn set_commits_clamped_value() {
        let mut controller = controller();
        assert_eq!(super::set(args("ext", "9"), &mut controller), Ok(5));
        assert_eq!(controller.option(OptionIndex::ExtensionBoards), 5);

        controller.options_load();
        assert_eq!(controller.option(OptionIndex::ExtensionBoards), 5, "Testing value was committed");
    }

    #[test]
    fn set_rejects_bad_input() {
        let mut controller = controller();
        assert_eq!(super::set(args("nope", "1"), &mut controller), Err("Unknown option"));
        assert_eq!(super::set(args("fwv", "1"), &mut controller), Err("Option is read-only"));
        assert_eq!(super::set(args("tz", "x"), &mut controller), Err("Could not parse value"));
        assert_eq!(super::set(vec!["tz".to_string()], &mut controller), Err("Expected an option name and a value"));
    }
}
