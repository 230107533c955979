/// Events flowing through the broadcast channel connecting all subsystems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckEvent {
    /// A button was pressed.
    ButtonDown(u8),

    /// A button was released.
    ButtonUp(u8),

    /// Stream Deck device connected.
    DeviceConnected,

    /// Stream Deck device disconnected.
    DeviceDisconnected,

    /// Re-render every button on the board.
    RenderAll,

    /// Re-render a single button by key index (its active flag changed).
    RenderButton(u8),
}
