//! Fixed facts about the reservation portal: URLs, element ids, calendar locale.

/// Login page of the reserved area
pub const LOGIN_URL: &str = "https://servizi.custorino.it/loginareariservata.aspx";

/// Username field on the login form
pub const USERNAME_INPUT: &str = "#UC_Login_TXTUser";
/// Password field on the login form
pub const PASSWORD_INPUT: &str = "#UC_Login_TXTPwd";
/// Login submit button
pub const LOGIN_BUTTON: &str = "#UC_Login_BTNLogin1";

/// "Prenotazioni" header link, only visible once logged in
pub const BOOKINGS_NAV: &str = "#BoxHeader_HyperLink3";
/// "Free Fitness" category link; opens the booking page in a new window
pub const FREE_FITNESS_LINK: &str = "#UC_ElencoPrenotazioni_HLFreeFitness";
/// Calendar table on the Free Fitness page
pub const CALENDAR: &str = "#UC_FreeFitness_Calendar1";

/// Slot checkboxes, in canonical order
pub const SLOT_CHECKBOXES: [&str; 4] = [
    "#UC_FreeFitness_GVPeriodi_CBScelta_0",
    "#UC_FreeFitness_GVPeriodi_CBScelta_1",
    "#UC_FreeFitness_GVPeriodi_CBScelta_2",
    "#UC_FreeFitness_GVPeriodi_CBScelta_3",
];

/// Human labels for the slots, same order as [`SLOT_CHECKBOXES`]
pub const SLOT_LABELS: [&str; 4] = ["14:00-15:30", "15:30-17:00", "17:00-18:30", "18:30-20:00"];

/// Booking confirmation link
pub const CONFIRM_BUTTON: &str = "#UC_FreeFitness_LBConferma";

/// Month names as the calendar renders them in anchor titles
pub const MONTHS_IT: [&str; 12] = [
    "gennaio",
    "febbraio",
    "marzo",
    "aprile",
    "maggio",
    "giugno",
    "luglio",
    "agosto",
    "settembre",
    "ottobre",
    "novembre",
    "dicembre",
];

/// Italian name for a 1-based month number
#[must_use]
pub fn month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|idx| MONTHS_IT.get(idx as usize))
        .copied()
}
