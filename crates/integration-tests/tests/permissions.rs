//! Role permissions as seen by the bot and the admin API.

use stockbot_core::permissions::{can_manage_item, permission_set, resolve};
use stockbot_core::{Action, Decision, NewItem, Role, TelegramUserId};
use stockbot_server::services::Command;
use stockbot_server::services::Dispatcher;

fn new_item() -> NewItem {
    NewItem {
        item_name: "DRILL".to_owned(),
        item_amount: 1,
        item_type: "tool".to_owned(),
        item_price: None,
        availability: true,
    }
}

#[test]
fn test_admin_may_do_everything() {
    for action in Action::ALL {
        assert_eq!(resolve(Role::Admin, action), Decision::Allow, "{action}");
    }
}

#[test]
fn test_user_is_limited_to_items() {
    let allowed = permission_set(Role::User);
    for action in Action::ALL {
        let expected = if allowed.contains(&action) {
            Decision::Allow
        } else {
            Decision::Deny
        };
        assert_eq!(resolve(Role::User, action), expected, "{action}");
    }
    for action in [
        Action::ManageUsers,
        Action::ViewUsers,
        Action::ManageSettings,
        Action::ManageAnyItem,
    ] {
        assert_eq!(resolve(Role::User, action), Decision::Deny, "{action}");
    }
}

#[test]
fn test_item_ownership() {
    let alice = TelegramUserId::new(1);
    let bob = TelegramUserId::new(2);

    assert_eq!(can_manage_item(Role::User, alice, Some(alice)), Decision::Allow);
    assert_eq!(can_manage_item(Role::User, alice, Some(bob)), Decision::Deny);
    assert_eq!(can_manage_item(Role::User, alice, None), Decision::Deny);
    assert_eq!(can_manage_item(Role::Admin, alice, Some(bob)), Decision::Allow);
    assert_eq!(can_manage_item(Role::Admin, alice, None), Decision::Allow);
}

#[test]
fn test_bot_commands_follow_permissions() {
    let user_commands = [
        Command::Help,
        Command::Items { filter: None },
        Command::Add(new_item()),
        Command::Available {
            name: "DRILL".to_owned(),
            availability: false,
        },
        Command::Remove {
            name: "DRILL".to_owned(),
        },
    ];
    for command in &user_commands {
        assert_eq!(Dispatcher::authorize(command, Role::User), Decision::Allow);
        assert_eq!(Dispatcher::authorize(command, Role::Admin), Decision::Allow);
    }

    let admin_commands = [
        Command::SetRole {
            telegram_user_id: TelegramUserId::new(5),
            role: Role::Admin,
        },
        Command::AddUser {
            telegram_user_id: TelegramUserId::new(5),
            role: Role::User,
        },
    ];
    for command in &admin_commands {
        assert_eq!(Dispatcher::authorize(command, Role::User), Decision::Deny);
        assert_eq!(Dispatcher::authorize(command, Role::Admin), Decision::Allow);
    }
}

#[test]
fn test_parsed_commands_carry_actions() {
    let cases = [
        ("/items", Some(Action::ViewItems)),
        ("/role 5 admin", Some(Action::ManageUsers)),
        ("/adduser 6", Some(Action::ManageUsers)),
        ("/help", None),
    ];
    for (text, action) in cases {
        let command = Command::parse(text)
            .unwrap_or_else(|e| panic!("{text}: {e}"))
            .unwrap_or_else(|| panic!("{text}: not a command"));
        assert_eq!(command.action(), action, "{text}");
    }
}
