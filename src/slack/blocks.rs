//! Slack Block Kit builders for the score prompt, notes modal and home tab.
//!
//! Every builder is pure and tolerates missing record data: blank columns
//! render as placeholders, never as errors.

use slack_morphism::prelude::{
    SlackActionBlockElement, SlackActionId, SlackActionsBlock, SlackBlock, SlackBlockButtonElement,
    SlackBlockChoiceItem, SlackBlockExternalSelectElement, SlackBlockId, SlackBlockMarkDownText,
    SlackBlockPlainTextInputElement, SlackBlockPlainTextOnly, SlackBlockStaticSelectElement,
    SlackBlockText, SlackContextBlock, SlackContextBlockElement, SlackDividerBlock,
    SlackHeaderBlock, SlackHomeView, SlackInputBlock, SlackInputBlockElement, SlackModalView,
    SlackSectionBlock, SlackSectionBlockElement, SlackView,
};

use crate::config::HomeConfig;
use crate::models::payload::{ActionKind, NOTES_INPUT_ACTION};
use crate::models::record::{RecordRow, ScoreField, NOTES_COLUMN};
use crate::week::{WeekBlockId, WeekId};

const EMPTY_FIELD: &str = "`<empty>`";

/// Build a markdown section block.
#[must_use]
pub fn text_section(text: &str) -> SlackBlock {
    SlackBlock::Section(SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(text.into())))
}

fn divider() -> SlackBlock {
    SlackBlock::Divider(SlackDividerBlock::new())
}

fn choice(value: &str) -> SlackBlockChoiceItem<SlackBlockPlainTextOnly> {
    SlackBlockChoiceItem::new(SlackBlockPlainTextOnly::from(value), value.to_owned())
}

/// One score select for `field`, pre-filled from `last`.
///
/// A value from the current week becomes the initial option; a value from
/// an older week only shows up in the placeholder.
#[must_use]
pub fn score_select(field: ScoreField, last: Option<&RecordRow>, week: WeekId) -> SlackBlock {
    let range = field.max_score();
    let previous = last.and_then(|row| row.score(field));
    let is_current = last.is_some_and(|row| row.is_for_week(&week));

    let options: Vec<_> = (1..=range).map(|n| choice(&n.to_string())).collect();
    let placeholder = match previous {
        Some(value) if !is_current => format!("Last week: {value}"),
        _ => format!("[1-{range}]"),
    };

    let mut select = SlackBlockStaticSelectElement::new(SlackActionId(
        ActionKind::PickScore.as_str().to_owned(),
    ))
    .with_placeholder(SlackBlockPlainTextOnly::from(placeholder))
    .with_options(options);
    if let (true, Some(value)) = (is_current, previous) {
        select = select.with_initial_option(choice(value));
    }

    SlackBlock::Section(
        SlackSectionBlock::new()
            .with_block_id(SlackBlockId(WeekBlockId::new(week, field.column()).to_string()))
            .with_text(SlackBlockText::MarkDown(format!("{}:", field.column()).into()))
            .with_accessory(SlackSectionBlockElement::StaticSelect(select)),
    )
}

/// Direct message asking for this week's scores.
#[must_use]
pub fn score_prompt(last: Option<&RecordRow>, week: WeekId) -> Vec<SlackBlock> {
    let mut blocks = vec![text_section(&format!(
        "For week *{week}*, how would you score:"
    ))];
    blocks.extend(
        ScoreField::ALL
            .into_iter()
            .map(|field| score_select(field, last, week)),
    );

    let notes_button = SlackBlockButtonElement::new(
        SlackActionId(ActionKind::OpenNotes.as_str().to_owned()),
        SlackBlockPlainTextOnly::from("Write notes"),
    )
    .with_style("primary".into());
    blocks.push(SlackBlock::Section(
        SlackSectionBlock::new()
            .with_block_id(SlackBlockId(WeekBlockId::new(week, NOTES_COLUMN).to_string()))
            .with_text(SlackBlockText::MarkDown("Notes:".into()))
            .with_accessory(SlackSectionBlockElement::Button(notes_button)),
    ));
    blocks
}

/// Modal editing the notes of `week`.
#[must_use]
pub fn notes_modal(week: WeekId, notes: Option<&str>) -> SlackView {
    let mut input =
        SlackBlockPlainTextInputElement::new(SlackActionId(NOTES_INPUT_ACTION.to_owned()))
            .with_multiline(true);
    if let Some(text) = notes.filter(|text| !text.is_empty()) {
        input = input.with_initial_value(text.to_owned());
    }

    let input_block = SlackInputBlock::new(
        SlackBlockPlainTextOnly::from("Write notes"),
        SlackInputBlockElement::PlainTextInput(input),
    )
    .with_block_id(SlackBlockId(WeekBlockId::new(week, NOTES_COLUMN).to_string()));

    SlackView::Modal(
        SlackModalView::new(
            SlackBlockPlainTextOnly::from("Notes"),
            vec![SlackBlock::Input(input_block)],
        )
        .with_submit(SlackBlockPlainTextOnly::from("Save")),
    )
}

/// Blocks shared by every home-tab variant.
#[derive(Debug, Clone, Default)]
pub struct HomeIntro {
    /// Announcement pinned above everything else.
    pub announcement: Option<String>,
    /// Link to the spreadsheet view.
    pub record_store_url: Option<String>,
    /// User to contact with questions.
    pub contact_user_id: Option<String>,
}

impl HomeIntro {
    /// Intro built from static config plus the current announcement.
    #[must_use]
    pub fn new(config: &HomeConfig, announcement: Option<String>) -> Self {
        Self {
            announcement,
            record_store_url: config.record_store_url.clone(),
            contact_user_id: config.contact_user_id.clone(),
        }
    }

    fn blocks(&self) -> Vec<SlackBlock> {
        let mut blocks = Vec::new();
        if let Some(text) = &self.announcement {
            blocks.push(text_section(&format!("*Announcement*: {text}")));
            blocks.push(divider());
        }

        let mut intro = String::from(
            "Every Friday we share project news, client satisfaction and how each of us is doing.\n\
             To follow everyone's growth we keep a weekly table of scores.\n\
             Below is your latest row, and you can ask me for a message to fill in or update this week's scores.",
        );
        if let Some(contact) = &self.contact_user_id {
            intro.push_str(&format!("\n_Questions or suggestions? Ask <@{contact}>._"));
        }

        blocks.push(SlackBlock::Header(SlackHeaderBlock::new(
            SlackBlockPlainTextOnly::from("Weekly scores from Slack"),
        )));
        blocks.push(text_section(&intro));
        blocks.push(divider());
        if let Some(url) = &self.record_store_url {
            blocks.push(text_section(&format!("<{url}|Open the spreadsheet>")));
        }
        blocks
    }
}

/// Wrap blocks into a home-tab view.
#[must_use]
pub fn home_view(blocks: Vec<SlackBlock>) -> SlackView {
    SlackView::Home(SlackHomeView::new(blocks))
}

/// Home tab for a user without a link: employee selector.
#[must_use]
pub fn home_unlinked(intro: &HomeIntro) -> Vec<SlackBlock> {
    let selector = SlackBlockExternalSelectElement::new(SlackActionId(
        ActionKind::SelectEmployee.as_str().to_owned(),
    ))
    .with_placeholder(SlackBlockPlainTextOnly::from("People in the spreadsheet"));

    let mut blocks = intro.blocks();
    blocks.push(text_section("I don't know who you are in the spreadsheet yet."));
    blocks.push(SlackBlock::Actions(SlackActionsBlock::new(vec![
        SlackActionBlockElement::ExternalSelect(selector),
    ])));
    blocks.push(SlackBlock::Context(SlackContextBlock::new(vec![
        SlackContextBlockElement::MarkDown(SlackBlockMarkDownText::new(
            "The list comes from last week's rows. If you are missing, add your row by hand and come back next week."
                .to_owned(),
        )),
    ])));
    blocks
}

/// Placeholder home tab shown while the latest row is fetched.
#[must_use]
pub fn home_loading(intro: &HomeIntro) -> Vec<SlackBlock> {
    let mut blocks = intro.blocks();
    blocks.push(text_section("Loading data from the spreadsheet..."));
    blocks
}

/// Home tab for a linked user.
///
/// `slack_user` is carried as the `submit_scores` button value.
#[must_use]
pub fn home_linked(
    intro: &HomeIntro,
    slack_user: &str,
    last: Option<&RecordRow>,
    week: WeekId,
) -> Vec<SlackBlock> {
    let mut blocks = intro.blocks();

    match last {
        None => blocks.push(text_section("It looks like you don't have any rows yet.")),
        Some(row) => {
            if row.is_for_week(&week) {
                blocks.push(text_section(
                    ":white_check_mark: You have a row this week with:",
                ));
            } else {
                blocks.push(text_section("*You don't have a row for this week yet.*"));
            }
            let row_week = row
                .fields
                .week
                .map_or_else(|| "?".to_owned(), |week| week.to_string());
            blocks.push(text_section(&format!(
                "Latest row (week *{row_week}*) in the spreadsheet"
            )));
            blocks.push(divider());
            blocks.push(SlackBlock::Section(
                SlackSectionBlock::new().with_fields(row_fields(row)),
            ));
        }
    }

    let submit = SlackBlockButtonElement::new(
        SlackActionId(ActionKind::SubmitScores.as_str().to_owned()),
        SlackBlockPlainTextOnly::from("Fill in this week"),
    )
    .with_value(slack_user.to_owned())
    .with_style("primary".into());
    let unlink = SlackBlockButtonElement::new(
        SlackActionId(ActionKind::Unlink.as_str().to_owned()),
        SlackBlockPlainTextOnly::from("Unlink"),
    )
    .with_value(slack_user.to_owned())
    .with_style("danger".into());
    blocks.push(SlackBlock::Actions(SlackActionsBlock::new(vec![
        SlackActionBlockElement::Button(submit),
        SlackActionBlockElement::Button(unlink),
    ])));
    blocks
}

fn row_fields(row: &RecordRow) -> Vec<SlackBlockText> {
    let mut fields: Vec<SlackBlockText> = ScoreField::ALL
        .into_iter()
        .map(|field| field_text(field.column(), row.score(field)))
        .collect();
    fields.push(field_text(NOTES_COLUMN, row.notes()));
    fields
}

fn field_text(label: &str, value: Option<&str>) -> SlackBlockText {
    SlackBlockText::MarkDown(format!("*{label}*:\n{}", value.unwrap_or(EMPTY_FIELD)).into())
}
