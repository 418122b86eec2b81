//! Default crisis phrases in English, Slovak and Czech.

use crate::types::ClassifierConfig;

fn s(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: s(&[
                // self-harm, english
                "suicide", "suicidal", "kill myself", "end my life", "want to die", "better off dead",
                "end it all", "take my own life", "hurt myself", "cut myself", "harm myself", "self harm",
                // self-harm, slovak / czech
                "samovrazda", "sebevrazda", "zabijem sa", "zabit sa", "ukoncit zivot", "chcem zomriet",
                "chci umrit", "ublizit si", "uskodit si",
                // hopelessness
                "chcem to skoncit", "chci to skoncit", "nevladzem dalej", "uz nemuzu", "je po vsem",
                "nema to zmysel", "nema to smysl",
                "no point living", "life is meaningless", "cannot go on",
                // substances
                "overdose", "predavkoval", "bad trip", "halucinacie",
            ]),
            patterns: s(&[
                r"myslim na (sebevrazd|samovrazd)",
                r"chc(i|em) spachat (sebevrazd|samovrazd)",
                r"chc(i|em) (skocit|skoncit)",
                r"\bi want to (die|kill|hurt|harm)",
                r"\bi (wish|want) i (was|were) dead",
                r"\bi can'?t (take|handle|deal with) (this|it) anymore",
                r"\blife isn'?t worth",
                r"\bi (am|was) on [a-z]+",
                r"\bi took [a-z]+",
                r"\bi'm (high|tripping|freaking)",
                r"\bseeing (fractals|patterns|colors)",
                r"\bhearing (things|voices)",
                r"\bcan'?t (stop|come down|control)",
            ]),
        }
    }
}
