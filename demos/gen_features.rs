//! Print the feature row for a sample user

fn main() {
    let json = r#"{
        "status": "repaid",
        "devices": [{
            "call_log": [
                { "phone_number": "*144#", "duration": "0", "datetime": 1490004000000 },
                { "phone_number": "0722000111", "duration": "95", "datetime": "2017-03-20T18:42:10" },
                { "phone_number": "0722000111", "duration": 40, "datetime": "2017-03-21 09:03:00" }
            ],
            "sms_log": [
                { "sms_address": "MPESA", "message_body": "Confirmed. You have received Ksh500", "datetime": 1490004060000 },
                { "sms_address": "0722000111", "message_body": "call me when you are free", "datetime": 1490090460000 },
                { "sms_address": "0722000111", "message_body": "ok", "datetime": 1490176860000 }
            ],
            "contacts": [
                { "date_added": 1480004000000, "last_time_contacted": 1490004000000 }
            ]
        }]
    }"#;

    match commlog_features::user_json_to_features(json, "demo-user") {
        Ok(row) => print!("{row}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
