/// Deterministic diagnostic-step generator backing the tier-2
/// `suggest_diagnostic_steps` tool. Keyword-keyed, no model call involved.
pub fn suggest_diagnostic_steps(topic: &str) -> Vec<String> {
	let lowered = topic.to_lowercase();

	if ["connection", "connect", "network", "offline", "wifi", "internet"]
		.iter()
		.any(|keyword| lowered.contains(keyword))
	{
		return vec![
			"Confirm the device shows an active network connection.".to_string(),
			"Open any website to verify general internet access.".to_string(),
			"Restart the router, wait one minute, then retry the connection.".to_string(),
			"If on Wi-Fi, move closer to the access point or try a wired connection.".to_string(),
		];
	}
	if ["error", "crash", "exception", "freeze", "frozen"]
		.iter()
		.any(|keyword| lowered.contains(keyword))
	{
		return vec![
			"Note the exact error text or code shown on screen.".to_string(),
			"Close the application fully and reopen it.".to_string(),
			"Check for a pending application update and install it.".to_string(),
			"Reproduce the problem once more and note what action triggers it.".to_string(),
		];
	}
	if ["slow", "performance", "lag", "latency", "loading"]
		.iter()
		.any(|keyword| lowered.contains(keyword))
	{
		return vec![
			"Close other applications and browser tabs, then retry.".to_string(),
			"Measure whether the slowness is constant or only during specific actions.".to_string(),
			"Restart the device to clear memory pressure.".to_string(),
			"Try from a different network to rule out connection speed.".to_string(),
		];
	}

	vec![
		"Restart the application and reproduce the problem once.".to_string(),
		"Note any message shown when the problem occurs.".to_string(),
		"Confirm the application is on its latest version.".to_string(),
	]
}
