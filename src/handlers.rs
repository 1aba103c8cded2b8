use std::{collections::HashMap, error::Error, sync::Arc};

use chrono::{Datelike, Local, Utc};
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId},
    utils::command::BotCommands,
};
use time::Date;
use tokio::sync::Mutex;
use url::Url;

use crate::admin::{self, AdminAuth, AdminSession};
use crate::booking::{self, BookingRequest, Catalog, SlotView};
use crate::booking_id;
use crate::calendar::{generate_calendar, parse_iso_date, shift_month, to_store_date};
use crate::clock::{self, ClockTime};
use crate::error::{capitalize, BookingError};
use crate::models::{effective_duration, Addon, BookingDetails, BookingFilter, BookingStatus};
use crate::notify::{format_long_date, ChangeRequest, Messenger};
use crate::pricing::{format_currency, AddonSelection, Settings, ADDITIONAL_HOUR_PRICE_KEY, CONTACT_NUMBER_KEY};
use crate::store::RecordStore;

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub auth: AdminAuth,
    pub messaging_base_url: Url,
    pub sessions: Mutex<HashMap<i64, Arc<Mutex<UserSession>>>>,
}

impl AppState {
    /// The chat's own session. The map lock is only held for the lookup, so
    /// chats do not wait on each other.
    async fn session(&self, chat_id: ChatId) -> Arc<Mutex<UserSession>> {
        self.sessions
            .lock()
            .await
            .entry(chat_id.0)
            .or_insert_with(|| Arc::new(Mutex::new(UserSession::new())))
            .clone()
    }

    async fn messenger(&self) -> Result<Messenger, BookingError> {
        let settings = Settings::from_rows(&self.store.list_settings().await?);
        Ok(Messenger::new(self.messaging_base_url.clone(), settings.contact_number))
    }
}

// Per-chat progress through the booking form
pub struct UserSession {
    step: UserStep,
    studio_id: Option<i32>,
    selected_date: Option<Date>,
    duration_hours: Option<i32>,
    additional_hour: bool,
    addons: AddonSelection,
    start_time: Option<ClockTime>,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    admin: Option<AdminSession>,
}

impl UserSession {
    fn new() -> Self {
        UserSession {
            step: UserStep::Start,
            studio_id: None,
            selected_date: None,
            duration_hours: None,
            additional_hour: false,
            addons: AddonSelection::new(),
            start_time: None,
            customer_name: String::new(),
            customer_phone: String::new(),
            customer_email: None,
            admin: None,
        }
    }

    /// Clears the booking form; an admin login survives.
    fn reset_booking(&mut self) {
        let admin = self.admin.take();
        *self = UserSession::new();
        self.admin = admin;
    }

    fn booking_request(&self) -> Option<BookingRequest> {
        Some(BookingRequest {
            studio_id: self.studio_id?,
            date: self.selected_date?,
            start_time: self.start_time?,
            duration_hours: self.duration_hours?,
            additional_hour: self.additional_hour,
            addons: self.addons.clone(),
            customer_name: self.customer_name.clone(),
            customer_phone: self.customer_phone.clone(),
            customer_email: self.customer_email.clone(),
            notes: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UserStep {
    Start,
    SelectingStudio,
    SelectingDate,
    SelectingDuration,
    SelectingExtraHour,
    SelectingAddons,
    SelectingTime,
    EnteringName,
    EnteringPhone,
    EnteringEmail,
    ConfirmingBooking,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Studio booking commands:")]
pub enum Command {
    #[command(description = "show this help")]
    Help,
    #[command(description = "book a studio")]
    Start,
    #[command(description = "look up a booking: /find HS-...")]
    Find(String),
    #[command(description = "log in as admin: /admin <password>")]
    Admin(String),
    #[command(description = "end the admin session")]
    Logout,
    #[command(description = "admin: /bookings [status] [YYYY-MM-DD] [page]")]
    Bookings(String),
    #[command(description = "admin: /setstatus <booking id> <pending|confirmed|cancelled>", parse_with = "split")]
    SetStatus { id: String, status: String },
    #[command(description = "admin: list pricing tiers")]
    Prices,
    #[command(description = "admin: /setprice <hours> <price>", parse_with = "split")]
    SetPrice { hours: i32, price: i64 },
    #[command(description = "admin: /removeprice <hours>")]
    RemovePrice(i32),
    #[command(description = "admin: list add-ons")]
    Addons,
    #[command(description = "admin: /addaddon <name>; <price>; [description]")]
    AddAddon(String),
    #[command(description = "admin: /editaddon <id>; <name>; <price>; [description]")]
    EditAddon(String),
    #[command(description = "admin: /toggleaddon <id>")]
    ToggleAddon(i32),
    #[command(description = "admin: /deleteaddon <id>")]
    DeleteAddon(i32),
    #[command(description = "admin: list studios")]
    Studios,
    #[command(description = "admin: /togglestudio <id>")]
    ToggleStudio(i32),
    #[command(description = "admin: show settings")]
    ShowSettings,
    #[command(description = "admin: /setextrahour <price>")]
    SetExtraHour(i64),
    #[command(description = "admin: /setcontact <number>")]
    SetContact(String),
}

impl Command {
    fn is_admin_only(&self) -> bool {
        !matches!(
            self,
            Command::Help | Command::Start | Command::Find(_) | Command::Admin(_) | Command::Logout
        )
    }
}

pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, state: Arc<AppState>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let session = state.session(chat_id).await;
    let mut session = session.lock().await;

    let result = run_command(&bot, chat_id, cmd, &mut session, &state).await;
    report_failure(&bot, chat_id, result).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        bot.send_message(chat_id, "Unknown command or wrong arguments. See /help.").await?;
        return Ok(());
    }

    let session = state.session(chat_id).await;
    let mut session = session.lock().await;

    let result = run_text(&bot, chat_id, text.trim(), &mut session, &state).await;
    report_failure(&bot, chat_id, result).await
}

pub async fn handle_callback_query(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> HandlerResult {
    let Some(msg) = q.message.as_ref().and_then(|m| m.regular_message()).cloned() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let data = q.data.clone().unwrap_or_default();
    debug!("callback query from {}: {}", msg.chat.id.0, data);

    let session = state.session(msg.chat.id).await;
    let mut session = session.lock().await;

    let result = run_callback(&bot, &msg, &data, &mut session, &state).await;
    bot.answer_callback_query(q.id.clone()).await?;
    report_failure(&bot, msg.chat.id, result).await
}

/// Turns domain errors into a reply; anything else goes up to the dispatcher.
async fn report_failure(bot: &Bot, chat_id: ChatId, result: HandlerResult) -> HandlerResult {
    let Err(e) = result else {
        return Ok(());
    };
    match e.downcast_ref::<BookingError>() {
        Some(err) => {
            match err {
                BookingError::StoreRead(_) | BookingError::StoreWrite(_) | BookingError::DuplicateBookingId => {
                    error!("store operation failed for chat {}: {}", chat_id.0, err)
                }
                _ => debug!("request from chat {} rejected: {}", chat_id.0, err),
            }
            bot.send_message(chat_id, err.user_message()).await?;
            Ok(())
        }
        None => Err(e),
    }
}

async fn run_command(
    bot: &Bot,
    chat_id: ChatId,
    cmd: Command,
    session: &mut UserSession,
    state: &AppState,
) -> HandlerResult {
    let store = state.store.as_ref();

    if cmd.is_admin_only() {
        if let Err(e) = admin::require(session.admin.as_ref(), Utc::now()) {
            session.admin = None;
            bot.send_message(chat_id, format!("{}. Log in with /admin <password>.", capitalize(&e.to_string())))
                .await?;
            return Ok(());
        }
    }

    match cmd {
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string()).await?;
        }
        Command::Start => {
            session.reset_booking();
            session.step = UserStep::SelectingStudio;
            show_studios(bot, chat_id, None, store).await?;
        }
        Command::Find(code) => {
            if code.trim().is_empty() {
                bot.send_message(chat_id, "Send your booking code like this: /find HS-XXXXXXXX-XXXXX")
                    .await?;
                return Ok(());
            }
            let details = booking::find_booking(store, &code).await?;
            show_booking(bot, chat_id, &details, state).await?;
        }
        Command::Admin(password) => match state.auth.login(&password, Utc::now()) {
            Ok(admin_session) => {
                session.admin = Some(admin_session);
                info!("admin login from chat {}", chat_id.0);
                bot.send_message(
                    chat_id,
                    format!(
                        "Logged in until {} UTC. See /help for admin commands.",
                        admin_session.expires_at().format("%H:%M")
                    ),
                )
                .await?;
            }
            Err(_) => {
                bot.send_message(chat_id, "Invalid password").await?;
            }
        },
        Command::Logout => {
            session.admin = None;
            bot.send_message(chat_id, "Logged out.").await?;
        }
        Command::Bookings(args) => {
            let filter = parse_booking_filter(&args);
            show_booking_list(bot, chat_id, None, store, &filter).await?;
        }
        Command::SetStatus { id, status } => {
            let status: BookingStatus = status.parse()?;
            let id = booking_id::normalize(&id);
            store.update_booking_status(&id, status).await?;
            info!("booking {} set to {}", id, status);
            bot.send_message(chat_id, format!("Booking {} is now {}", id, status.label())).await?;
        }
        Command::Prices => {
            let tiers = store.list_pricing_tiers().await?;
            let mut text = String::from("Pricing tiers:\n");
            for tier in &tiers {
                text += &format!("{} h · {}\n", tier.duration_hours, format_currency(tier.price));
            }
            if tiers.is_empty() {
                text += "none configured\n";
            }
            bot.send_message(chat_id, text).await?;
        }
        Command::SetPrice { hours, price } => {
            if hours <= 0 || price < 0 {
                bot.send_message(chat_id, "Hours must be positive and the price non-negative.").await?;
                return Ok(());
            }
            store.upsert_pricing_tier(hours, price).await?;
            bot.send_message(chat_id, format!("{} h now costs {}", hours, format_currency(price))).await?;
        }
        Command::RemovePrice(hours) => {
            store.delete_pricing_tier(hours).await?;
            bot.send_message(chat_id, format!("{} h is no longer offered", hours)).await?;
        }
        Command::Addons => {
            let addons = store.list_addons(false).await?;
            let mut text = String::from("Add-ons:\n");
            for addon in &addons {
                text += &format!(
                    "#{} {} · {}{}\n",
                    addon.id,
                    addon.name,
                    format_currency(addon.price),
                    if addon.is_active { "" } else { " (inactive)" }
                );
            }
            bot.send_message(chat_id, text).await?;
        }
        Command::AddAddon(args) => {
            let Some((name, price, description)) = parse_addon_fields(&args) else {
                bot.send_message(chat_id, "Usage: /addaddon <name>; <price>; [description]").await?;
                return Ok(());
            };
            let addon = store.create_addon(&name, description.as_deref(), price).await?;
            bot.send_message(chat_id, format!("Added #{} {}", addon.id, addon.name)).await?;
        }
        Command::EditAddon(args) => {
            let parsed = args
                .split_once(';')
                .and_then(|(id, rest)| Some((id.trim().parse::<i32>().ok()?, parse_addon_fields(rest)?)));
            let Some((id, (name, price, description))) = parsed else {
                bot.send_message(chat_id, "Usage: /editaddon <id>; <name>; <price>; [description]").await?;
                return Ok(());
            };
            let mut addon = find_addon(store, id).await?;
            addon.name = name;
            addon.price = price;
            addon.description = description;
            store.update_addon(&addon).await?;
            bot.send_message(chat_id, format!("Updated #{} {}", addon.id, addon.name)).await?;
        }
        Command::ToggleAddon(id) => {
            let mut addon = find_addon(store, id).await?;
            addon.is_active = !addon.is_active;
            store.update_addon(&addon).await?;
            bot.send_message(
                chat_id,
                format!("{} is now {}", addon.name, if addon.is_active { "active" } else { "inactive" }),
            )
            .await?;
        }
        Command::DeleteAddon(id) => {
            store.delete_addon(id).await?;
            bot.send_message(chat_id, format!("Deleted add-on #{}", id)).await?;
        }
        Command::Studios => {
            let studios = store.list_studios(false).await?;
            let mut text = String::from("Studios:\n");
            for studio in &studios {
                text += &format!(
                    "#{} {}{}\n",
                    studio.id,
                    studio.name,
                    if studio.is_active { "" } else { " (inactive)" }
                );
            }
            bot.send_message(chat_id, text).await?;
        }
        Command::ToggleStudio(id) => {
            let studio = store.get_studio(id).await?;
            store.set_studio_active(id, !studio.is_active).await?;
            bot.send_message(
                chat_id,
                format!("{} is now {}", studio.name, if studio.is_active { "inactive" } else { "active" }),
            )
            .await?;
        }
        Command::ShowSettings => {
            let settings = Settings::from_rows(&store.list_settings().await?);
            let contact = if settings.contact_number.is_empty() {
                "not set".to_string()
            } else {
                settings.contact_number
            };
            bot.send_message(
                chat_id,
                format!(
                    "Extra hour: {}\nContact number: {}",
                    format_currency(settings.additional_hour_price),
                    contact
                ),
            )
            .await?;
        }
        Command::SetExtraHour(price) => {
            if price < 0 {
                bot.send_message(chat_id, "The price must not be negative.").await?;
                return Ok(());
            }
            store.upsert_setting(ADDITIONAL_HOUR_PRICE_KEY, &price.to_string()).await?;
            bot.send_message(chat_id, format!("Extra hour now costs {}", format_currency(price))).await?;
        }
        Command::SetContact(number) => {
            let number: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
            store.upsert_setting(CONTACT_NUMBER_KEY, &number).await?;
            bot.send_message(chat_id, format!("Contact number set to {:?}", number)).await?;
        }
    }
    Ok(())
}

async fn run_text(bot: &Bot, chat_id: ChatId, text: &str, session: &mut UserSession, state: &AppState) -> HandlerResult {
    match session.step {
        UserStep::EnteringName => {
            if text.is_empty() {
                bot.send_message(chat_id, "Please enter your name:").await?;
                return Ok(());
            }
            session.customer_name = text.to_string();
            session.step = UserStep::EnteringPhone;
            bot.send_message(chat_id, "Your phone number:").await?;
        }
        UserStep::EnteringPhone => {
            if !text.chars().any(|c| c.is_ascii_digit()) {
                bot.send_message(chat_id, "That does not look like a phone number. Try again:").await?;
                return Ok(());
            }
            session.customer_phone = text.to_string();
            session.step = UserStep::EnteringEmail;
            bot.send_message(chat_id, "Your email, or \"-\" to skip:").await?;
        }
        UserStep::EnteringEmail => {
            session.customer_email = match text {
                "-" | "" => None,
                email if email.contains('@') => Some(email.to_string()),
                _ => {
                    bot.send_message(chat_id, "Please send a valid email or \"-\" to skip:").await?;
                    return Ok(());
                }
            };
            session.step = UserStep::ConfirmingBooking;
            show_summary(bot, chat_id, None, session, state.store.as_ref()).await?;
        }
        _ => {
            bot.send_message(
                chat_id,
                "Send /start to book a studio or /find <code> to look up a booking.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn run_callback(
    bot: &Bot,
    msg: &Message,
    data: &str,
    session: &mut UserSession,
    state: &AppState,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let store = state.store.as_ref();
    let parts: Vec<&str> = data.split(':').collect();

    match parts.as_slice() {
        ["ignore"] => {}
        ["back_to_studios"] => {
            session.step = UserStep::SelectingStudio;
            show_studios(bot, chat_id, Some(msg.id), store).await?;
        }
        ["studio", id] => {
            let studio = store.get_studio(id.parse()?).await?;
            if !studio.is_active {
                return Err(BookingError::InvalidBooking(format!("{} is not taking bookings", studio.name)).into());
            }
            session.studio_id = Some(studio.id);
            session.step = UserStep::SelectingDate;
            show_calendar(bot, chat_id, msg.id, None).await?;
        }
        ["calendar", "select", date] => {
            let Some(date) = parse_iso_date(date) else {
                return Ok(());
            };
            if Some(date) < to_store_date(Local::now().date_naive()) {
                bot.send_message(chat_id, "You cannot pick a date in the past. Please choose another date.")
                    .await?;
                return Ok(());
            }
            session.selected_date = Some(date);
            session.step = UserStep::SelectingDuration;
            show_durations(bot, chat_id, msg.id, store).await?;
        }
        ["calendar", direction @ ("next_month" | "prev_month"), month, year] => {
            let (month, year) = shift_month(month.parse()?, year.parse()?, *direction == "next_month");
            bot.edit_message_reply_markup(chat_id, msg.id)
                .reply_markup(generate_calendar(month, year, Local::now().date_naive()))
                .await?;
        }
        ["back_to_calendar"] => {
            session.step = UserStep::SelectingDate;
            show_calendar(bot, chat_id, msg.id, session.selected_date).await?;
        }
        ["duration", hours] => {
            session.duration_hours = Some(hours.parse()?);
            session.step = UserStep::SelectingExtraHour;
            let settings = Settings::from_rows(&store.list_settings().await?);
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    format!("➕ Extra hour (+{})", format_currency(settings.additional_hour_price)),
                    "extra:yes",
                )],
                vec![InlineKeyboardButton::callback("No extra hour", "extra:no")],
                vec![InlineKeyboardButton::callback("⟵ Back to dates", "back_to_calendar")],
            ]);
            bot.edit_message_text(chat_id, msg.id, "Would you like to add an extra hour?")
                .reply_markup(keyboard)
                .await?;
        }
        ["extra", answer] => {
            session.additional_hour = *answer == "yes";
            session.step = UserStep::SelectingAddons;
            let catalog = Catalog::load(store).await?;
            show_addons(bot, chat_id, msg.id, &catalog.addons, &session.addons).await?;
        }
        ["addon", id] => {
            let id: i32 = id.parse()?;
            let quantity = session.addons.entry(id).or_insert(0);
            *quantity = if *quantity > 0 { 0 } else { 1 };
            let catalog = Catalog::load(store).await?;
            show_addons(bot, chat_id, msg.id, &catalog.addons, &session.addons).await?;
        }
        ["addons_done"] => {
            let (Some(studio_id), Some(date), Some(duration)) =
                (session.studio_id, session.selected_date, session.duration_hours)
            else {
                return restart(bot, chat_id, session).await;
            };
            let view = booking::slots_for(store, studio_id, date, duration, session.additional_hour).await?;
            session.step = UserStep::SelectingTime;
            show_time_slots(bot, chat_id, msg.id, date, &view).await?;
        }
        ["time", hour, minute] => {
            let start: ClockTime = format!("{}:{}", hour, minute).parse()?;
            session.start_time = Some(start);
            session.step = UserStep::EnteringName;
            bot.edit_message_text(chat_id, msg.id, format!("Start time: {}", start.to_12h())).await?;
            bot.send_message(chat_id, "Please enter your name:").await?;
        }
        ["book", "confirm"] => {
            let Some(request) = session.booking_request() else {
                return restart(bot, chat_id, session).await;
            };
            let details = booking::reserve(store, &request).await?;
            session.reset_booking();
            bot.edit_message_reply_markup(chat_id, msg.id).await?;

            let messenger = state.messenger().await?;
            let mut text = format!(
                "✅ Booking created!\n\nBooking ID: {}\nTotal: {}\n\nKeep the ID to look the booking up later with /find.",
                details.booking.id,
                format_currency(details.booking.total_price)
            );
            if messenger.has_contact() {
                text += "\nTap below to confirm it with the studio.";
                let link = Url::parse(&messenger.confirmation_link(&details))?;
                let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url("💬 Confirm booking", link)]]);
                bot.send_message(chat_id, text).reply_markup(keyboard).await?;
            } else {
                bot.send_message(chat_id, text).await?;
            }
        }
        ["book", "cancel"] => {
            session.reset_booking();
            bot.edit_message_text(chat_id, msg.id, "Booking discarded. Send /start to begin again.")
                .await?;
        }
        ["status", id, status] => {
            admin::require(session.admin.as_ref(), Utc::now())?;
            let status: BookingStatus = status.parse()?;
            store.update_booking_status(id, status).await?;
            info!("booking {} set to {}", id, status);
            bot.send_message(chat_id, format!("Booking {} is now {}", id, status.label())).await?;
        }
        ["bookings_page", page, status, date] => {
            admin::require(session.admin.as_ref(), Utc::now())?;
            let filter = BookingFilter {
                status: status.parse().ok(),
                date: parse_iso_date(date),
                page: page.parse()?,
            };
            show_booking_list(bot, chat_id, Some(msg.id), store, &filter).await?;
        }
        _ => {
            warn!("unhandled callback data {:?}", data);
        }
    }
    Ok(())
}

async fn restart(bot: &Bot, chat_id: ChatId, session: &mut UserSession) -> HandlerResult {
    session.reset_booking();
    bot.send_message(chat_id, "Your booking session has expired. Send /start to begin again.")
        .await?;
    Ok(())
}

async fn show(
    bot: &Bot,
    chat_id: ChatId,
    edit: Option<MessageId>,
    text: String,
    keyboard: InlineKeyboardMarkup,
) -> HandlerResult {
    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
    }
    Ok(())
}

async fn show_studios(bot: &Bot, chat_id: ChatId, edit: Option<MessageId>, store: &dyn RecordStore) -> HandlerResult {
    let studios = store.list_studios(true).await?;
    if studios.is_empty() {
        bot.send_message(chat_id, "No studios are open for booking right now 😢").await?;
        return Ok(());
    }

    let mut text = String::from("Choose a studio 📸\n");
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for studio in &studios {
        if let Some(description) = &studio.description {
            text += &format!("\n{}: {}", studio.name, description);
        }
        keyboard.push(vec![InlineKeyboardButton::callback(
            studio.name.clone(),
            format!("studio:{}", studio.id),
        )]);
    }
    show(bot, chat_id, edit, text, InlineKeyboardMarkup::new(keyboard)).await
}

async fn show_calendar(bot: &Bot, chat_id: ChatId, message_id: MessageId, selected: Option<Date>) -> HandlerResult {
    let today = Local::now().date_naive();
    let (month, year) = match selected {
        Some(date) => (u8::from(date.month()) as u32, date.year()),
        None => (today.month(), today.year()),
    };
    show(
        bot,
        chat_id,
        Some(message_id),
        "Choose a date 📅".to_string(),
        generate_calendar(month, year, today),
    )
    .await
}

async fn show_durations(bot: &Bot, chat_id: ChatId, message_id: MessageId, store: &dyn RecordStore) -> HandlerResult {
    let tiers = store.list_pricing_tiers().await?;
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = tiers
        .iter()
        .map(|tier| {
            vec![InlineKeyboardButton::callback(
                format!("{} h · {}", tier.duration_hours, format_currency(tier.price)),
                format!("duration:{}", tier.duration_hours),
            )]
        })
        .collect();
    keyboard.push(vec![InlineKeyboardButton::callback("⟵ Back to dates", "back_to_calendar")]);
    show(
        bot,
        chat_id,
        Some(message_id),
        "How long do you need the studio?".to_string(),
        InlineKeyboardMarkup::new(keyboard),
    )
    .await
}

async fn show_addons(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    addons: &[Addon],
    selected: &AddonSelection,
) -> HandlerResult {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = addons
        .iter()
        .map(|addon| {
            let mark = if selected.get(&addon.id).copied().unwrap_or(0) > 0 { "✅" } else { "▫️" };
            vec![InlineKeyboardButton::callback(
                format!("{} {} · {}", mark, addon.name, format_currency(addon.price)),
                format!("addon:{}", addon.id),
            )]
        })
        .collect();
    keyboard.push(vec![InlineKeyboardButton::callback("Continue ➡️", "addons_done")]);
    show(
        bot,
        chat_id,
        Some(message_id),
        "Pick any add-ons you need:".to_string(),
        InlineKeyboardMarkup::new(keyboard),
    )
    .await
}

async fn show_time_slots(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    date: Date,
    view: &SlotView,
) -> HandlerResult {
    let mut text = if view.available.is_empty() {
        format!("No free time left on {} for this session length.", format_long_date(date))
    } else {
        format!("Choose a start time on {}:", format_long_date(date))
    };
    if !view.booked.is_empty() {
        let booked: Vec<String> = view.booked.iter().map(|i| format!("{}-{}", i.start, i.end)).collect();
        text += &format!("\nAlready booked: {}", booked.join(", "));
    }

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = view
        .available
        .chunks(2)
        .map(|row| {
            row.iter()
                .map(|slot| InlineKeyboardButton::callback(slot.to_string(), format!("time:{}", slot)))
                .collect()
        })
        .collect();
    keyboard.push(vec![InlineKeyboardButton::callback("⟵ Back to dates", "back_to_calendar")]);

    show(bot, chat_id, Some(message_id), text, InlineKeyboardMarkup::new(keyboard)).await
}

async fn show_summary(
    bot: &Bot,
    chat_id: ChatId,
    edit: Option<MessageId>,
    session: &UserSession,
    store: &dyn RecordStore,
) -> HandlerResult {
    let (Some(studio_id), Some(date), Some(start), Some(duration)) = (
        session.studio_id,
        session.selected_date,
        session.start_time,
        session.duration_hours,
    ) else {
        bot.send_message(chat_id, "Your booking session has expired. Send /start to begin again.")
            .await?;
        return Ok(());
    };

    let catalog = Catalog::load(store).await?;
    let studio = store.get_studio(studio_id).await?;
    let hours = effective_duration(duration, session.additional_hour);
    let end = clock::end_time(start, hours.max(0) as u32);

    let mut text = format!(
        "Please check your booking:\n\nStudio: {}\nDate: {}\nTime: {} - {}\nDuration: {} hours\n",
        studio.name,
        format_long_date(date),
        start.to_12h(),
        end.to_12h(),
        hours
    );
    let picked: Vec<&Addon> = catalog
        .addons
        .iter()
        .filter(|a| session.addons.get(&a.id).copied().unwrap_or(0) > 0)
        .collect();
    if !picked.is_empty() {
        text += "\nAdd-ons:\n";
        for addon in picked {
            text += &format!("- {} (x{})\n", addon.name, session.addons[&addon.id]);
        }
    }
    text += &format!(
        "\nTotal: {}\n\nName: {}\nPhone: {}",
        format_currency(catalog.quote(duration, session.additional_hour, &session.addons)),
        session.customer_name,
        session.customer_phone
    );
    if let Some(email) = &session.customer_email {
        text += &format!("\nEmail: {}", email);
    }

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("✅ Book it", "book:confirm")],
        vec![InlineKeyboardButton::callback("❌ Discard", "book:cancel")],
    ]);
    show(bot, chat_id, edit, text, keyboard).await
}

async fn show_booking(bot: &Bot, chat_id: ChatId, details: &BookingDetails, state: &AppState) -> HandlerResult {
    let booking = &details.booking;
    let mut text = format!(
        "Booking {}\n\nStatus: {}\nStudio: {}\nDate: {}\nTime: {} - {}\nDuration: {} hours\n",
        booking.id,
        booking.status.label(),
        details.studio_name,
        format_long_date(booking.booking_date),
        booking.start_time.to_12h(),
        booking.end_time().to_12h(),
        booking.effective_duration()
    );
    for addon in &details.addons {
        text += &format!("- {} (x{}) · {}\n", addon.name, addon.quantity, format_currency(addon.price));
    }
    text += &format!("\nTotal: {}", format_currency(booking.total_price));

    let messenger = state.messenger().await?;
    if !messenger.has_contact() || booking.status == BookingStatus::Cancelled {
        bot.send_message(chat_id, text).await?;
        return Ok(());
    }
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(
            "✏️ Ask to modify",
            Url::parse(&messenger.change_link(details, ChangeRequest::Modify))?,
        )],
        vec![InlineKeyboardButton::url(
            "❌ Ask to cancel",
            Url::parse(&messenger.change_link(details, ChangeRequest::Cancel))?,
        )],
    ]);
    bot.send_message(chat_id, text).reply_markup(keyboard).await?;
    Ok(())
}

async fn show_booking_list(
    bot: &Bot,
    chat_id: ChatId,
    edit: Option<MessageId>,
    store: &dyn RecordStore,
    filter: &BookingFilter,
) -> HandlerResult {
    let total = store.count_bookings().await?;
    let bookings = store.search_bookings(filter).await?;

    let mut text = format!("Bookings: {} in total · page {}\n", total, filter.page + 1);
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for summary in &bookings {
        let booking = &summary.booking;
        text += &format!(
            "\n{} · {}\n{} {}-{} · {} · {}\n{} ({})\n",
            booking.id,
            booking.status.label(),
            booking.booking_date,
            booking.start_time,
            booking.end_time(),
            summary.studio_name,
            format_currency(booking.total_price),
            booking.customer_name,
            booking.customer_phone
        );
        let mut row = Vec::new();
        for status in BookingStatus::ALL {
            if status != booking.status {
                row.push(InlineKeyboardButton::callback(
                    format!("{} {}", status.label(), booking.id),
                    format!("status:{}:{}", booking.id, status),
                ));
            }
        }
        keyboard.push(row);
    }
    if bookings.is_empty() {
        text += "\nNothing matches.";
    }

    let status = filter.status.map(|s| s.as_str()).unwrap_or("all");
    let date = filter.date.map(|d| d.to_string()).unwrap_or_else(|| "any".to_string());
    let mut nav = Vec::new();
    if filter.page > 0 {
        nav.push(InlineKeyboardButton::callback(
            "< Newer",
            format!("bookings_page:{}:{}:{}", filter.page - 1, status, date),
        ));
    }
    if bookings.len() as u32 == BookingFilter::PAGE_SIZE {
        nav.push(InlineKeyboardButton::callback(
            "Older >",
            format!("bookings_page:{}:{}:{}", filter.page + 1, status, date),
        ));
    }
    if !nav.is_empty() {
        keyboard.push(nav);
    }

    show(bot, chat_id, edit, text, InlineKeyboardMarkup::new(keyboard)).await
}

async fn find_addon(store: &dyn RecordStore, id: i32) -> Result<Addon, BookingError> {
    store
        .list_addons(false)
        .await?
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| BookingError::not_found("add-on", id))
}

/// `/bookings [status] [YYYY-MM-DD] [page]`, in any order; page is 1-based.
fn parse_booking_filter(args: &str) -> BookingFilter {
    let mut filter = BookingFilter::default();
    for token in args.split_whitespace() {
        if let Ok(status) = token.parse::<BookingStatus>() {
            filter.status = Some(status);
        } else if let Some(date) = parse_iso_date(token) {
            filter.date = Some(date);
        } else if let Ok(page) = token.parse::<u32>() {
            filter.page = page.saturating_sub(1);
        }
    }
    filter
}

/// `<name>; <price>; [description]`
fn parse_addon_fields(args: &str) -> Option<(String, i64, Option<String>)> {
    let mut fields = args.splitn(3, ';').map(str::trim);
    let name = fields.next().filter(|n| !n.is_empty())?.to_string();
    let price = fields.next()?.parse::<i64>().ok().filter(|p| *p >= 0)?;
    let description = fields.next().filter(|d| !d.is_empty()).map(str::to_string);
    Some((name, price, description))
}
