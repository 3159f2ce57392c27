use indexmap::IndexMap;

use super::catalog::{ActionSpec, Character};

const FOX_XIAOLI: &str = concat!(
    "A cute cartoon 3D orange fox cub with big round brown eyes, white fluffy chest ",
    "fur, and a bushy orange tail with a white tip, sitting on green grass in a ",
    "sunlit forest",
);

const STAR_CAT: &str = concat!(
    "A cute cartoon 3D lavender-gray cat with glowing constellation star-line ",
    "patterns on its fur, large deep-blue eyes with starlight reflections, small ",
    "rounded ears with inner purple glow, wearing a midnight blue hoodie with a ",
    "crescent moon embroidery on the chest, fluffy tail with gradient from lavender ",
    "to deep indigo with twinkling star particles at the tip. The cat is sitting on ",
    "dark rooftop tiles at night. Background: starry sky with constellations, ",
    "crescent moon, distant warm city lights in soft bokeh, depth-of-field blur",
);

fn character(
    id: &str,
    name: &str,
    emoji: &str,
    description: &str,
    actions: &[(&str, &str, u32)],
) -> Character {
    let actions = actions
        .iter()
        .map(|(action, motion, duration)| {
            (
                (*action).to_string(),
                ActionSpec {
                    id: (*action).to_string(),
                    prompt: format!("{description}. {motion}"),
                    duration_seconds: *duration,
                },
            )
        })
        .collect();
    Character {
        id: id.to_string(),
        name: name.to_string(),
        emoji: emoji.to_string(),
        description: description.to_string(),
        actions,
    }
}

pub(crate) fn default_characters() -> IndexMap<String, Character> {
    let mut map = IndexMap::new();

    map.insert(
        "fox-xiaoli".to_string(),
        character(
            "fox-xiaoli",
            "狐小狸",
            "🦊",
            FOX_XIAOLI,
            &[
                (
                    "idle",
                    concat!(
                        "The little fox sits perfectly still in a calm, relaxed resting pose. Extremely ",
                        "subtle, lifelike micro-movements only: very slow gentle breathing motion in ",
                        "the chest, occasional soft blink, and the tiniest ear twitch. No head ",
                        "movement, no paw movement, no body shifting. The overall impression is a ",
                        "peaceful, living creature at rest. Very minimal and natural. The pose at the ",
                        "end is exactly the same as the beginning, creating a seamless loop.",
                    ),
                    6,
                ),
                (
                    "speaking",
                    concat!(
                        "The little fox has subtle mouth movements and gentle facial expression ",
                        "changes. Its mouth opens and closes slightly as if talking, showing a friendly ",
                        "expression. Subtle ear twitching. At the end, it returns to the exact same ",
                        "neutral pose as the beginning with a calm, gentle smile.",
                    ),
                    6,
                ),
                (
                    "listening",
                    concat!(
                        "The little fox turns its head to the side and raises one front paw to its ear, ",
                        "then holds completely still in this listening pose. No mouth movement, no ",
                        "blinking, no body movement - perfectly still and focused. The expression is ",
                        "calm, quiet, and deeply concentrated, like carefully listening to a faint ",
                        "sound. The pose is maintained motionless throughout, simulating a real ",
                        "attentive listener. At the end, it slowly lowers its paw and turns back, ",
                        "returning to the exact same neutral pose as the beginning, with its head ",
                        "centered and a calm expression.",
                    ),
                    6,
                ),
                (
                    "wave",
                    concat!(
                        "The little fox raises one front paw and waves hello with a playful, cheerful ",
                        "expression. Its tail sways gently with excitement. The movement is cute and ",
                        "energetic. At the end, it lowers its paw and returns to the exact same neutral ",
                        "pose as the beginning, sitting calmly with paws on the ground.",
                    ),
                    6,
                ),
                (
                    "nod",
                    concat!(
                        "The little fox simply nods its head up and down slowly and clearly, showing ",
                        "agreement. Only the head moves - no paw movement, no body movement, no other ",
                        "gestures. The mouth stays closed, the body stays perfectly still, only the ",
                        "head nods gently. A soft, approving smile on its face. Minimal and clean ",
                        "motion. At the end, it stops nodding and returns to the exact same neutral ",
                        "pose as the beginning, with its head level and a calm expression.",
                    ),
                    6,
                ),
                (
                    "think",
                    concat!(
                        "The little fox shows a thoughtful expression, tilting its head slightly and ",
                        "looking upward with one paw raised near its chin. Its eyes look contemplative ",
                        "and curious. At the end, it lowers its paw and returns to the exact same ",
                        "neutral pose as the beginning, with a calm, neutral expression.",
                    ),
                    6,
                ),
                (
                    "sneeze",
                    concat!(
                        "The little fox's nose twitches rapidly, its eyes squint, then it lets out an ",
                        "adorable big sneeze - head jerking forward with ears flattening back. After ",
                        "the sneeze, it shakes its head and looks slightly dazed with a funny ",
                        "expression. At the end, it returns to the exact same neutral pose as the ",
                        "beginning, with a calm, gentle smile.",
                    ),
                    6,
                ),
                (
                    "shy",
                    concat!(
                        "The little fox suddenly becomes shy and bashful. It covers its face with both ",
                        "front paws, ears flatten back, and its tail curls around its body. It peeks ",
                        "through its paws with one eye, looking adorably embarrassed. At the end, it ",
                        "lowers its paws and returns to the exact same neutral pose as the beginning, ",
                        "sitting calmly with a gentle smile.",
                    ),
                    6,
                ),
                (
                    "tail_wag",
                    concat!(
                        "The little fox looks back at its own bushy tail, then starts wagging it ",
                        "enthusiastically from side to side with pure joy. Its whole body wiggles ",
                        "slightly with the movement. It looks happy and excited, ears perked up. At the ",
                        "end, it stops wagging and returns to the exact same neutral pose as the ",
                        "beginning, sitting calmly facing forward.",
                    ),
                    6,
                ),
            ],
        ),
    );

    map.insert(
        "star-cat".to_string(),
        character(
            "star-cat",
            "星罗猫",
            "🐱",
            STAR_CAT,
            &[
                (
                    "idle",
                    concat!(
                        "The cat sits perfectly still in a calm, elegant posture on the rooftop edge. ",
                        "Paws neatly together in front, tail gently curled around its body. Extremely ",
                        "subtle, lifelike micro-movements only: very slow gentle breathing motion, ",
                        "occasional soft blink. No head movement, no paw movement, no body shifting. ",
                        "Regal, composed, dignified demeanor. The overall impression is a noble, ",
                        "peaceful creature at rest. The pose at the end is exactly the same as the ",
                        "beginning, creating a seamless loop.",
                    ),
                    6,
                ),
                (
                    "speaking",
                    concat!(
                        "The cat is speaking with subtle lip movements, mouth opening and closing ",
                        "gently as if explaining something. One front paw lifts slightly in a gentle ",
                        "gesture. Eyes warm and engaged, looking directly at the camera. The cat ",
                        "remains in a relaxed upright seated pose on the rooftop throughout. No body ",
                        "shifting, no standing up, no leaning forward or backward. IMPORTANT: The first ",
                        "frame and last frame must be nearly identical — the cat in the same calm ",
                        "seated pose, paws together on the ground, head centered, gentle smile. This ",
                        "ensures seamless looping.",
                    ),
                    6,
                ),
                (
                    "speaking_v2",
                    concat!(
                        "The cat is speaking with subtle natural lip movements. One front paw lifts ",
                        "just slightly off the ground in a small unconscious gesture, like a person ",
                        "casually moving their hand while chatting — understated, not exaggerated. The ",
                        "tail tip sways gently, a slow lazy movement. Occasional soft blink, relaxed ",
                        "warm eyes looking at the camera. Natural and conversational, not performative. ",
                        "The cat remains in a relaxed upright seated pose on the rooftop throughout. No ",
                        "big movements, no standing up, no leaning forward or backward. IMPORTANT: The ",
                        "first frame and last frame must be nearly identical — the cat in the same calm ",
                        "seated pose, paws together on the ground, head centered, gentle smile. This ",
                        "ensures seamless looping and smooth transition from other speaking clips.",
                    ),
                    6,
                ),
                (
                    "listening",
                    concat!(
                        "The cat tilts its head clearly to one side, one ear perked up noticeably ",
                        "higher than the other, leaning in attentively. Eyes wide and focused, looking ",
                        "straight at the camera with full attention. Mouth firmly closed. Body holds ",
                        "completely still and perfectly steady. No mouth movement, no fidgeting, no ",
                        "body shifting. Only the head tilt and ear position show active listening. ",
                        "Still, focused, attentive. At the end, it slowly straightens its head, ",
                        "returning to the exact same neutral pose as the beginning, with head centered ",
                        "and a calm expression.",
                    ),
                    6,
                ),
                (
                    "wave",
                    concat!(
                        "The cat raises its right paw up high in a clear friendly wave, paw pads ",
                        "visible, fingers spread slightly. The left paw stays resting on the rooftop ",
                        "tile. A cheerful bright smile with eyes slightly squinted from joy. Tail lifts ",
                        "gently behind. No body shifting from the seated position, no standing up. Only ",
                        "the right paw waves. At the end, it lowers its paw and returns to the exact ",
                        "same neutral pose as the beginning, sitting calmly with paws together.",
                    ),
                    6,
                ),
                (
                    "nod",
                    concat!(
                        "The cat simply nods slowly and clearly, chin moving downward toward the chest. ",
                        "Eyes half-closed with a warm agreeing smile. Only the head moves, body stays ",
                        "perfectly still in seated position. Both paws rest neatly in front. No ",
                        "dramatic movement, no body swaying. A gentle, single, clear nod. Subtle and ",
                        "graceful. At the end, it stops nodding and returns to the exact same neutral ",
                        "pose as the beginning, with its head level and a calm expression.",
                    ),
                    6,
                ),
                (
                    "think",
                    concat!(
                        "The cat raises one paw to its chin in a classic thinking pose, looking upward ",
                        "at the starry sky with a contemplative expression. Eyes gazing up and to the ",
                        "side, eyebrows slightly furrowed in concentration. The constellation patterns ",
                        "on the fur glow slightly brighter. Mouth in a small thoughtful pout. Body ",
                        "stays still in seated position. No extra movements. Only the paw-on-chin and ",
                        "upward gaze show thinking. At the end, it lowers its paw and returns to the ",
                        "exact same neutral pose as the beginning, looking straight at the camera with ",
                        "a calm expression.",
                    ),
                    6,
                ),
                (
                    "sneeze",
                    concat!(
                        "The cat squeezes its eyes tightly shut with nose scrunched up, head tilting ",
                        "back slightly in a sneeze. Tiny glowing star particles burst from the nose ",
                        "like magical sparkles. Both paws clutch the front of the hoodie. Constellation ",
                        "patterns on fur flicker. A cute involuntary expression. No body shifting from ",
                        "seated position. At the end, it returns to the exact same neutral pose as the ",
                        "beginning, sitting calmly with a gentle smile.",
                    ),
                    6,
                ),
                (
                    "shy",
                    concat!(
                        "The cat covers its face with both paws in a bashful shy pose, peeking through ",
                        "the gap between paws with one eye visible. Ears flattened back slightly. Tail ",
                        "curls tightly around the body. A soft blush glow appears on cheeks. Body stays ",
                        "in seated position on rooftop. No standing, no body shifting. Only the paws ",
                        "covering face and peeking eye show shyness. At the end, it lowers its paws and ",
                        "returns to the exact same neutral pose as the beginning, sitting calmly with a ",
                        "gentle smile.",
                    ),
                    6,
                ),
                (
                    "tail_wag",
                    concat!(
                        "The cat sits calmly facing the camera. Its fluffy tail slowly rises behind it ",
                        "and sways gently from side to side, with a soft faint glow at the tip. The cat ",
                        "notices its own tail moving and glances back briefly with a small curious ",
                        "smile, then looks back at the camera with a content, happy expression. The ",
                        "movement is gentle and lazy, not fast or energetic. Body stays seated, paws ",
                        "stay on the ground. No standing, no jumping, no paw gestures. At the end, the ",
                        "tail settles down and the cat returns to the exact same neutral pose as the ",
                        "beginning, sitting calmly facing the camera with a gentle smile.",
                    ),
                    6,
                ),
            ],
        ),
    );

    map
}
