pub(crate) mod command_controller;
pub(crate) mod configuration_controller;
pub(crate) mod health_check_controller;
pub(crate) mod oauth_controller;
